// ==========================================
// 配送计划优化系统 - 0/1 背包精确求解器
// ==========================================
// 算法: 按重量维度的动态规划, 逆序更新防止同一物品重复使用
// 路径: 选择链 arena (物品下标, 前驱节点), 借自缓冲池
// 平局: 同价值取最小重量
// 宽度: min(W, 可装入物品重量之和), 载重远大于物品总重时不按 W 分配
// 红线: 同一输入重复求解必须返回同一组订单
// ==========================================

use crate::engine::buffer_pool::{BufferPool, ChoiceNode, DpBuffers, NIL};
use crate::engine::candidate::{Candidate, KnapsackItem};
use tracing::{debug, instrument};

/// 选择链节点下标为 u32, 单次求解的 DP 单元数不能超过此值
pub const MAX_EXACT_CELLS: u64 = NIL as u64 - 1;

/// DP 单元数 n × (W+1)（溢出时返回 u64::MAX）
pub fn dp_cells(item_count: usize, capacity: i64) -> u64 {
    if capacity < 0 {
        return 0;
    }
    (item_count as u64)
        .checked_mul((capacity as u64).saturating_add(1))
        .unwrap_or(u64::MAX)
}

/// DP 宽度: 载重与可装入物品总重量取小
///
/// 任何子集的重量都不超过物品总重量, 收紧后最优解不变
pub fn dp_width(items: &[KnapsackItem], capacity: i64) -> i64 {
    if capacity <= 0 {
        return 0;
    }
    let total = items
        .iter()
        .filter(|it| it.weight > 0 && it.value >= 0 && it.weight <= capacity)
        .fold(0i64, |acc, it| acc.saturating_add(it.weight));
    total.min(capacity)
}

// ==========================================
// ExactSolver - 精确求解器
// ==========================================
pub struct ExactSolver<'p> {
    buffers: &'p BufferPool,
}

impl<'p> ExactSolver<'p> {
    pub fn new(buffers: &'p BufferPool) -> Self {
        Self { buffers }
    }

    /// 是否能在选择链地址范围内求解
    pub fn supports(item_count: usize, capacity: i64) -> bool {
        dp_cells(item_count, capacity) <= MAX_EXACT_CELLS
    }

    /// 求解
    ///
    /// # 参数
    /// - `items`: 已按确定性顺序排列的物品
    /// - `capacity`: 载重上限
    ///
    /// # 返回
    /// - 最优候选解; 载重 <= 0 或无物品时返回空解
    /// - 规模超出选择链地址范围时返回 None
    #[instrument(skip(self, items), fields(n = items.len()))]
    pub fn solve(&self, items: &[KnapsackItem], capacity: i64) -> Option<Candidate> {
        if capacity <= 0 || items.is_empty() {
            return Some(Candidate::empty());
        }
        let width = dp_width(items, capacity);
        if width == 0 {
            return Some(Candidate::empty());
        }
        if !Self::supports(items.len(), width) {
            return None;
        }
        let cap = usize::try_from(width).ok()?;

        let mut guard = self.buffers.acquire(cap + 1);
        let DpBuffers {
            best,
            last_choice,
            arena,
        } = &mut *guard;

        for (pos, item) in items.iter().enumerate() {
            if item.weight <= 0 || item.value < 0 || item.weight > width {
                continue;
            }
            let w = item.weight as usize;
            for cw in (w..=cap).rev() {
                let with_item = best[cw - w] + item.value;
                if with_item > best[cw] {
                    best[cw] = with_item;
                    arena.push(ChoiceNode {
                        item: pos as u32,
                        prev: last_choice[cw - w],
                    });
                    last_choice[cw] = (arena.len() - 1) as u32;
                }
            }
        }

        // best 随重量单调不减, 第一个达到最大值的位置即最小重量
        let mut best_w = 0;
        for cw in 1..=cap {
            if best[cw] > best[best_w] {
                best_w = cw;
            }
        }

        let mut picks = Vec::new();
        let mut node = last_choice[best_w];
        while node != NIL {
            let n = arena[node as usize];
            picks.push(n.item as usize);
            node = n.prev;
        }

        debug!(
            arena_nodes = arena.len(),
            best_weight = best_w,
            best_value = best[best_w],
            "精确求解完成"
        );

        Some(Candidate::from_picks(items, picks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn items(pairs: &[(i64, i64)]) -> Vec<KnapsackItem> {
        pairs.iter()
            .enumerate()
            .map(|(i, &(weight, value))| KnapsackItem { index: i, weight, value })
            .collect()
    }

    fn brute_force(items: &[KnapsackItem], capacity: i64) -> i64 {
        let n = items.len();
        let mut best = 0;
        for mask in 0u32..(1 << n) {
            let (mut w, mut v) = (0, 0);
            for (i, it) in items.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    w += it.weight;
                    v += it.value;
                }
            }
            if w <= capacity && v > best {
                best = v;
            }
        }
        best
    }

    #[test]
    fn test_concrete_scenario_prefers_2_and_4() {
        let pool = BufferPool::default();
        let its = items(&[(5, 10), (4, 40), (6, 30), (3, 50)]);
        let c = ExactSolver::new(&pool).solve(&its, 10).unwrap();
        assert_eq!(c.picks, vec![1, 3]);
        assert_eq!(c.weight, 7);
        assert_eq!(c.value, 90);
    }

    #[test]
    fn test_zero_capacity_is_empty() {
        let pool = BufferPool::default();
        let its = items(&[(1, 10), (2, 5)]);
        let c = ExactSolver::new(&pool).solve(&its, 0).unwrap();
        assert!(c.is_empty());
        assert_eq!((c.weight, c.value), (0, 0));
    }

    #[test]
    fn test_ties_prefer_minimum_weight() {
        let pool = BufferPool::default();
        let its = items(&[(4, 10), (2, 10), (3, 10)]);
        let c = ExactSolver::new(&pool).solve(&its, 4).unwrap();
        assert_eq!(c.picks, vec![1]);
        assert_eq!(c.weight, 2);
    }

    #[test]
    fn test_matches_brute_force_on_small_inputs() {
        let pool = BufferPool::default();
        let solver = ExactSolver::new(&pool);
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..300 {
            let n = rng.gen_range(0..13);
            let capacity: i64 = rng.gen_range(0..=100);
            let pairs: Vec<(i64, i64)> = (0..n)
                .map(|_| (rng.gen_range(1..=40), rng.gen_range(0..=100)))
                .collect();
            let its = items(&pairs);

            let c = solver.solve(&its, capacity).unwrap();
            assert_eq!(c.value, brute_force(&its, capacity), "pairs={:?} cap={}", pairs, capacity);
            assert!(c.weight <= capacity);
            let w: i64 = c.picks.iter().map(|&p| its[p].weight).sum();
            let v: i64 = c.picks.iter().map(|&p| its[p].value).sum();
            assert_eq!((c.weight, c.value), (w, v));
        }
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let pool = BufferPool::default();
        let solver = ExactSolver::new(&pool);
        let mut rng = StdRng::seed_from_u64(42);
        let pairs: Vec<(i64, i64)> = (0..60)
            .map(|_| (rng.gen_range(1..=20), rng.gen_range(0..50)))
            .collect();
        let its = items(&pairs);

        let first = solver.solve(&its, 97).unwrap();
        for _ in 0..5 {
            assert_eq!(solver.solve(&its, 97).unwrap(), first);
        }
        // 缓冲区已归还, 第二次起全部复用
        assert_eq!(pool.stats().allocated, 1);
    }

    #[test]
    fn test_zero_value_items_yield_empty_selection() {
        let pool = BufferPool::default();
        let its = items(&[(3, 0), (4, 0)]);
        let c = ExactSolver::new(&pool).solve(&its, 10).unwrap();
        assert!(c.is_empty());
    }

    #[test]
    fn test_oversized_instance_is_rejected() {
        assert!(!ExactSolver::supports(10, i64::MAX));
        assert!(ExactSolver::supports(10, 1000));
        assert_eq!(dp_cells(3, 9), 30);
    }

    #[test]
    fn test_huge_capacity_uses_item_weight_width() {
        let pool = BufferPool::default();
        let its = items(&[(5, 10), (4, 40), (6, 30), (3, 50), (i64::MAX / 2, 1)]);
        assert_eq!(dp_width(&its, 1 << 40), 18);

        let c = ExactSolver::new(&pool).solve(&its, 1 << 40).unwrap();
        assert_eq!(c.picks, vec![0, 1, 2, 3]);
        assert_eq!((c.weight, c.value), (18, 130));

        // 归还的缓冲区按宽度分配, 未按载重
        let guard = pool.acquire(0);
        assert!(guard.best.capacity() < 1024);
    }

    #[test]
    fn test_width_ignores_unusable_items() {
        let its = items(&[(0, 10), (3, -1), (50, 10), (4, 1)]);
        assert_eq!(dp_width(&its, 10), 4);
        assert_eq!(dp_width(&its, 0), 0);
        assert_eq!(dp_width(&items(&[(3, 1), (4, 1)]), 5), 5);
    }
}
