// ==========================================
// 配送计划优化系统 - 求解输入与候选解
// ==========================================
// 所有求解器共用的物品视图与候选解表示
// 红线: 重量 <= 0、价值 < 0、重量超过载重的订单在此被过滤, 不进入任何求解器
// ==========================================

use crate::domain::order::Order;
use std::cmp::Ordering;

/// 求解器视角的物品
///
/// `index` 指向调用方传入的订单切片
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnapsackItem {
    pub index: usize,
    pub weight: i64,
    pub value: i64,
}

impl KnapsackItem {
    /// 价值密度（重量为 0 视为无穷大）
    pub fn density(&self) -> f64 {
        if self.weight == 0 {
            f64::INFINITY
        } else {
            self.value as f64 / self.weight as f64
        }
    }
}

/// 按价值密度降序比较（精确的交叉相乘, 不经过浮点）
pub fn cmp_density_desc(a: &KnapsackItem, b: &KnapsackItem) -> Ordering {
    let lhs = a.value as i128 * b.weight as i128;
    let rhs = b.value as i128 * a.weight as i128;
    rhs.cmp(&lhs)
}

/// 过滤并按 (order_id, product_id) 排序, 得到确定性的求解输入
pub fn collect_items(orders: &[Order], capacity: i64) -> Vec<KnapsackItem> {
    let mut indices: Vec<usize> = (0..orders.len())
        .filter(|&i| orders[i].fits(capacity))
        .collect();
    indices.sort_by(|&a, &b| {
        let (oa, ob) = (&orders[a], &orders[b]);
        oa.order_id
            .cmp(&ob.order_id)
            .then(oa.product_id.cmp(&ob.product_id))
    });

    indices
        .into_iter()
        .map(|i| KnapsackItem {
            index: i,
            weight: orders[i].weight,
            value: orders[i].value,
        })
        .collect()
}

// ==========================================
// Candidate - 候选解
// ==========================================
// picks 为 items 切片中的位置（不是订单下标）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub picks: Vec<usize>,
    pub weight: i64,
    pub value: i64,
}

impl Candidate {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 由选中位置构造, 合计重新计算, 位置升序去重
    pub fn from_picks(items: &[KnapsackItem], mut picks: Vec<usize>) -> Self {
        picks.sort_unstable();
        picks.dedup();
        let weight = picks.iter().map(|&p| items[p].weight).sum();
        let value = picks.iter().map(|&p| items[p].value).sum();
        Self {
            picks,
            weight,
            value,
        }
    }

    /// 由选中标记构造
    pub fn from_mask(items: &[KnapsackItem], mask: &[bool]) -> Self {
        let picks = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &on)| if on { Some(i) } else { None })
            .collect();
        Self::from_picks(items, picks)
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    /// 是否比另一个候选解更好: 价值更高, 或价值相同重量更轻
    pub fn better_than(&self, other: &Candidate) -> bool {
        self.value > other.value || (self.value == other.value && self.weight < other.weight)
    }

    /// 映射回原始订单下标（升序）
    pub fn order_indices(&self, items: &[KnapsackItem]) -> Vec<usize> {
        let mut idx: Vec<usize> = self.picks.iter().map(|&p| items[p].index).collect();
        idx.sort_unstable();
        idx
    }
}

/// 单件兜底: 价值最高者, 同价值取重量最轻, 再按位置
///
/// items 已过滤为可装入的订单
pub fn single_item_fallback(items: &[KnapsackItem]) -> Option<usize> {
    items
        .iter()
        .enumerate()
        .min_by(|(ia, a), (ib, b)| {
            b.value
                .cmp(&a.value)
                .then(a.weight.cmp(&b.weight))
                .then(ia.cmp(ib))
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ShipmentStatus;

    fn order(order_id: i64, weight: i64, value: i64) -> Order {
        Order {
            order_id,
            user_id: 1,
            product_id: order_id,
            weight,
            value,
            status: ShipmentStatus::Eligible,
            created_at: None,
            arrived_at: None,
        }
    }

    #[test]
    fn test_collect_items_filters_and_sorts() {
        let orders = vec![
            order(9, 3, 5),
            order(2, 0, 100), // 重量为 0
            order(4, 2, -1),  // 负价值
            order(7, 50, 10), // 超载
            order(1, 4, 0),
        ];
        let items = collect_items(&orders, 10);
        let ids: Vec<i64> = items.iter().map(|it| orders[it.index].order_id).collect();
        assert_eq!(ids, vec![1, 9]);
    }

    #[test]
    fn test_density_ordering_is_exact() {
        let a = KnapsackItem { index: 0, weight: 3, value: 10 };
        let b = KnapsackItem { index: 1, weight: 6, value: 20 };
        let c = KnapsackItem { index: 2, weight: 1, value: 5 };
        assert_eq!(cmp_density_desc(&a, &b), Ordering::Equal);
        assert_eq!(cmp_density_desc(&c, &a), Ordering::Less);
        assert_eq!(KnapsackItem { index: 0, weight: 0, value: 1 }.density(), f64::INFINITY);
    }

    #[test]
    fn test_fallback_prefers_value_then_weight() {
        let items = vec![
            KnapsackItem { index: 0, weight: 5, value: 10 },
            KnapsackItem { index: 1, weight: 3, value: 10 },
            KnapsackItem { index: 2, weight: 1, value: 2 },
        ];
        assert_eq!(single_item_fallback(&items), Some(1));
        assert_eq!(single_item_fallback(&[]), None);
    }
}
