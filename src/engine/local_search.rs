// ==========================================
// 配送计划优化系统 - 局部搜索
// ==========================================
// 邻域（按顺序尝试, 首次改进即接受）:
// - Add:      加入一件未选订单
// - Exchange: 换出一件已选订单, 换入一件未选订单
// - PairSwap: 换出两件已选订单, 换入一件未选订单
// 终止: 无改进 / 达到轮数上限 / 取消令牌触发
// 红线: 每次接受的移动都严格提升总价值且不超载
// ==========================================

use crate::engine::cancel::CancelToken;
use crate::engine::candidate::{Candidate, KnapsackItem};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Add { incoming: usize },
    Exchange { outgoing: usize, incoming: usize },
    PairSwap { out_a: usize, out_b: usize, incoming: usize },
}

/// 局部搜索参数
#[derive(Debug, Clone, Copy)]
pub struct LocalSearchParams {
    pub max_rounds: usize,
    pub poll_interval: u64,
}

impl Default for LocalSearchParams {
    fn default() -> Self {
        Self {
            max_rounds: 1000,
            poll_interval: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSearchOutcome {
    pub candidate: Candidate,
    pub rounds: usize,
    pub cancelled: bool,
}

struct MoveTicker<'a> {
    token: &'a CancelToken,
    poll_interval: u64,
    evaluations: u64,
    cancelled: bool,
}

impl MoveTicker<'_> {
    /// 计数一次邻域评估, 到达轮询间隔时检查令牌
    fn tick(&mut self) -> bool {
        self.evaluations += 1;
        if self.evaluations % self.poll_interval == 0 && self.token.is_cancelled() {
            self.cancelled = true;
        }
        self.cancelled
    }
}

/// 从起始解出发做首次改进局部搜索
pub fn improve(
    items: &[KnapsackItem],
    capacity: i64,
    start: &Candidate,
    params: LocalSearchParams,
    token: &CancelToken,
) -> LocalSearchOutcome {
    let mut selected = vec![false; items.len()];
    for &p in &start.picks {
        selected[p] = true;
    }
    let mut weight = start.weight;
    let mut value = start.value;

    let mut ticker = MoveTicker {
        token,
        poll_interval: params.poll_interval.max(1),
        evaluations: 0,
        cancelled: token.is_cancelled(),
    };

    let mut rounds = 0;
    while rounds < params.max_rounds && !ticker.cancelled {
        let Some(mv) = find_improving_move(items, capacity, &selected, weight, &mut ticker) else {
            break;
        };
        match mv {
            Move::Add { incoming } => {
                selected[incoming] = true;
                weight += items[incoming].weight;
                value += items[incoming].value;
            }
            Move::Exchange { outgoing, incoming } => {
                selected[outgoing] = false;
                selected[incoming] = true;
                weight += items[incoming].weight - items[outgoing].weight;
                value += items[incoming].value - items[outgoing].value;
            }
            Move::PairSwap {
                out_a,
                out_b,
                incoming,
            } => {
                selected[out_a] = false;
                selected[out_b] = false;
                selected[incoming] = true;
                weight += items[incoming].weight - items[out_a].weight - items[out_b].weight;
                value += items[incoming].value - items[out_a].value - items[out_b].value;
            }
        }
        rounds += 1;
    }

    let candidate = Candidate::from_mask(items, &selected);
    debug_assert_eq!((weight, value), (candidate.weight, candidate.value));
    debug!(
        rounds,
        evaluations = ticker.evaluations,
        cancelled = ticker.cancelled,
        start_value = start.value,
        value = candidate.value,
        "局部搜索结束"
    );

    LocalSearchOutcome {
        candidate,
        rounds,
        cancelled: ticker.cancelled,
    }
}

fn find_improving_move(
    items: &[KnapsackItem],
    capacity: i64,
    selected: &[bool],
    weight: i64,
    ticker: &mut MoveTicker<'_>,
) -> Option<Move> {
    let inside: Vec<usize> = (0..items.len()).filter(|&i| selected[i]).collect();
    let outside: Vec<usize> = (0..items.len()).filter(|&i| !selected[i]).collect();
    let free = capacity - weight;

    for &j in &outside {
        if ticker.tick() {
            return None;
        }
        if items[j].weight <= free && items[j].value > 0 {
            return Some(Move::Add { incoming: j });
        }
    }

    for &i in &inside {
        for &j in &outside {
            if ticker.tick() {
                return None;
            }
            let gain = items[j].value - items[i].value;
            if gain > 0 && items[j].weight - items[i].weight <= free {
                return Some(Move::Exchange {
                    outgoing: i,
                    incoming: j,
                });
            }
        }
    }

    for (a_pos, &a) in inside.iter().enumerate() {
        for &b in &inside[a_pos + 1..] {
            let released_w = items[a].weight + items[b].weight;
            let released_v = items[a].value + items[b].value;
            for &j in &outside {
                if ticker.tick() {
                    return None;
                }
                if items[j].value > released_v && items[j].weight - released_w <= free {
                    return Some(Move::PairSwap {
                        out_a: a,
                        out_b: b,
                        incoming: j,
                    });
                }
            }
        }
    }

    None
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

    #[test]
    fn test_add_move_fills_free_capacity() {
        let its = items(&[(3, 5), (2, 4)]);
        let start = Candidate::from_picks(&its, vec![0]);
        let out = improve(&its, 5, &start, LocalSearchParams::default(), &CancelToken::new());
        assert_eq!(out.candidate.picks, vec![0, 1]);
        assert_eq!(out.candidate.value, 9);
    }

    #[test]
    fn test_exchange_move_upgrades_item() {
        let its = items(&[(4, 5), (4, 9)]);
        let start = Candidate::from_picks(&its, vec![0]);
        let out = improve(&its, 4, &start, LocalSearchParams::default(), &CancelToken::new());
        assert_eq!(out.candidate.picks, vec![1]);
        assert_eq!(out.rounds, 1);
    }

    #[test]
    fn test_pair_swap_replaces_two_small_items() {
        let its = items(&[(3, 4), (3, 4), (6, 20)]);
        let start = Candidate::from_picks(&its, vec![0, 1]);
        let out = improve(&its, 6, &start, LocalSearchParams::default(), &CancelToken::new());
        assert_eq!(out.candidate.picks, vec![2]);
        assert_eq!(out.candidate.value, 20);
    }

    #[test]
    fn test_never_worsens_or_overloads() {
        let its = items(&[(5, 10), (4, 40), (6, 30), (3, 50), (2, 1), (7, 33)]);
        // 遍历全部起点
        for mask in 0usize..(1 << its.len()) {
            let picks: Vec<usize> = (0..its.len()).filter(|&i| mask & (1 << i) != 0).collect();
            let start = Candidate::from_picks(&its, picks);
            if start.weight > 12 {
                continue;
            }
            let out = improve(&its, 12, &start, LocalSearchParams::default(), &CancelToken::new());
            assert!(out.candidate.value >= start.value);
            assert!(out.candidate.weight <= 12);
        }
    }

    #[test]
    fn test_cancelled_token_returns_start() {
        let its = items(&[(3, 5), (2, 4)]);
        let start = Candidate::from_picks(&its, vec![0]);
        let token = CancelToken::new();
        token.cancel();
        let out = improve(&its, 5, &start, LocalSearchParams::default(), &token);
        assert!(out.cancelled);
        assert_eq!(out.candidate, start);
    }

    #[test]
    fn test_round_cap_is_respected() {
        let its = items(&[(1, 1), (1, 1), (1, 1), (1, 1)]);
        let params = LocalSearchParams {
            max_rounds: 2,
            poll_interval: 4096,
        };
        let out = improve(&its, 10, &Candidate::empty(), params, &CancelToken::new());
        assert_eq!(out.rounds, 2);
        assert_eq!(out.candidate.value, 2);
    }
}
