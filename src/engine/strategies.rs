// ==========================================
// 配送计划优化系统 - 贪心种子策略
// ==========================================
// 一组命名的候选解生成器, 由启发式编排器统一调度
// 每个策略都是 (items, capacity) -> Candidate 的纯函数
// ==========================================

use crate::engine::candidate::{cmp_density_desc, Candidate, KnapsackItem};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// 两阶段策略第一阶段占用的载重比例（分子/分母）
const TWO_PHASE_RATIO: (i64, i64) = (7, 10);

/// 均衡策略: 密度权重 / 归一化价值权重 / 价值归一化分母
const BALANCED_DENSITY_WEIGHT: f64 = 0.7;
const BALANCED_VALUE_WEIGHT: f64 = 0.3;
const BALANCED_VALUE_SCALE: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStrategy {
    ValueDensity,   // 价值密度降序
    Value,          // 价值降序
    Weight,         // 重量升序
    HighValueFirst, // 价值降序, 同价值按密度
    Balanced,       // 0.7 密度 + 0.3 归一化价值
    TwoPhase,       // 70% 载重按密度, 剩余按价值
}

impl SeedStrategy {
    pub const ALL: [SeedStrategy; 6] = [
        SeedStrategy::ValueDensity,
        SeedStrategy::Value,
        SeedStrategy::Weight,
        SeedStrategy::HighValueFirst,
        SeedStrategy::Balanced,
        SeedStrategy::TwoPhase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeedStrategy::ValueDensity => "value_density",
            SeedStrategy::Value => "value",
            SeedStrategy::Weight => "weight",
            SeedStrategy::HighValueFirst => "high_value_first",
            SeedStrategy::Balanced => "balanced",
            SeedStrategy::TwoPhase => "two_phase",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// 生成候选解
    pub fn seed(&self, items: &[KnapsackItem], capacity: i64) -> Candidate {
        if capacity <= 0 || items.is_empty() {
            return Candidate::empty();
        }

        match self {
            SeedStrategy::ValueDensity => {
                let order = sorted_positions(items, cmp_density_desc);
                greedy_fill(items, &order, capacity)
            }
            SeedStrategy::Value => {
                let order = sorted_positions(items, |a, b| b.value.cmp(&a.value));
                greedy_fill(items, &order, capacity)
            }
            SeedStrategy::Weight => {
                let order = sorted_positions(items, |a, b| a.weight.cmp(&b.weight));
                greedy_fill(items, &order, capacity)
            }
            SeedStrategy::HighValueFirst => {
                let order = sorted_positions(items, |a, b| {
                    b.value.cmp(&a.value).then_with(|| cmp_density_desc(a, b))
                });
                greedy_fill(items, &order, capacity)
            }
            SeedStrategy::Balanced => {
                let order = sorted_positions(items, |a, b| {
                    balanced_score(b).total_cmp(&balanced_score(a))
                });
                greedy_fill(items, &order, capacity)
            }
            SeedStrategy::TwoPhase => two_phase(items, capacity),
        }
    }
}

impl fmt::Display for SeedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn balanced_score(item: &KnapsackItem) -> f64 {
    BALANCED_DENSITY_WEIGHT * item.density()
        + BALANCED_VALUE_WEIGHT * (item.value as f64 / BALANCED_VALUE_SCALE)
}

/// 按比较器排序后的位置列表（稳定排序, 同键保持输入顺序）
fn sorted_positions<F>(items: &[KnapsackItem], mut cmp: F) -> Vec<usize>
where
    F: FnMut(&KnapsackItem, &KnapsackItem) -> Ordering,
{
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| cmp(&items[a], &items[b]));
    order
}

/// 按给定顺序逐个尝试, 放得下就放（放不下继续看后面的）
fn greedy_fill(items: &[KnapsackItem], order: &[usize], capacity: i64) -> Candidate {
    let mut remaining = capacity;
    let mut picks = Vec::new();
    for &p in order {
        if items[p].weight <= remaining {
            remaining -= items[p].weight;
            picks.push(p);
        }
    }
    Candidate::from_picks(items, picks)
}

fn two_phase(items: &[KnapsackItem], capacity: i64) -> Candidate {
    let phase_one_cap = (capacity as i128 * TWO_PHASE_RATIO.0 as i128 / TWO_PHASE_RATIO.1 as i128) as i64;

    let by_density = sorted_positions(items, cmp_density_desc);
    let first = greedy_fill(items, &by_density, phase_one_cap);

    let mut taken = vec![false; items.len()];
    for &p in &first.picks {
        taken[p] = true;
    }

    let mut remaining = capacity - first.weight;
    let mut picks = first.picks;
    let by_value = sorted_positions(items, |a, b| b.value.cmp(&a.value));
    for p in by_value {
        if !taken[p] && items[p].weight <= remaining {
            remaining -= items[p].weight;
            picks.push(p);
        }
    }
    Candidate::from_picks(items, picks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(pairs: &[(i64, i64)]) -> Vec<KnapsackItem> {
        pairs.iter()
            .enumerate()
            .map(|(i, &(weight, value))| KnapsackItem { index: i, weight, value })
            .collect()
    }

    fn scenario() -> Vec<KnapsackItem> {
        items(&[(5, 10), (4, 40), (6, 30), (3, 50)])
    }

    #[test]
    fn test_every_strategy_respects_capacity() {
        let its = scenario();
        for strategy in SeedStrategy::ALL {
            for cap in 0..=20 {
                let c = strategy.seed(&its, cap);
                assert!(c.weight <= cap.max(0), "{} cap={}", strategy, cap);
                let w: i64 = c.picks.iter().map(|&p| its[p].weight).sum();
                let v: i64 = c.picks.iter().map(|&p| its[p].value).sum();
                assert_eq!(c.weight, w);
                assert_eq!(c.value, v);
            }
        }
    }

    #[test]
    fn test_value_density_greedy() {
        // 密度: 2, 10, 5, 16.7 -> 先选 3(w3) 再选 1(w4), 剩 3 放不下其他
        let c = SeedStrategy::ValueDensity.seed(&scenario(), 10);
        assert_eq!(c.picks, vec![1, 3]);
        assert_eq!(c.value, 90);
    }

    #[test]
    fn test_greedy_keeps_scanning_after_a_miss() {
        // 价值降序: (6,100) 放入后 (5,90) 放不下, 仍继续放入 (1,1)
        let its = items(&[(6, 100), (5, 90), (1, 1)]);
        let c = SeedStrategy::Value.seed(&its, 7);
        assert_eq!(c.picks, vec![0, 2]);
        assert_eq!(c.value, 101);
    }

    #[test]
    fn test_weight_greedy_takes_lightest() {
        let c = SeedStrategy::Weight.seed(&scenario(), 7);
        assert_eq!(c.picks, vec![1, 3]);
    }

    #[test]
    fn test_two_phase_reserves_tail_for_value() {
        // 第一阶段载重 7: 按密度选入 (1,10) 与 (3,20)
        // 第二阶段剩余 6: 价值最高且放得下的 (6,30)
        let its = items(&[(1, 10), (6, 30), (3, 20), (8, 35)]);
        let c = SeedStrategy::TwoPhase.seed(&its, 10);
        assert_eq!(c.picks, vec![0, 1, 2]);
        assert_eq!(c.weight, 10);
        assert_eq!(c.value, 60);
    }

    #[test]
    fn test_parse_strategy_names() {
        assert_eq!(SeedStrategy::parse("balanced"), Some(SeedStrategy::Balanced));
        assert_eq!(SeedStrategy::parse(" TWO_PHASE "), Some(SeedStrategy::TwoPhase));
        assert_eq!(SeedStrategy::parse("random"), None);
    }
}
