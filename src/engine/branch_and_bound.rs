// ==========================================
// 配送计划优化系统 - 分支定界求解器
// ==========================================
// 搜索: 按价值密度降序逐个决定 装入/不装入, 先试装入
// 定界: 剩余物品的分数松弛上界（最后一件允许按比例切分, 向下取整）
// 剪枝: 上界不超过当前最优整数解时剪掉
// 取消: 每 poll_interval 步轮询一次取消令牌, 取消时返回已找到的最优解
// 实现: 显式栈深度优先, 不使用递归
// ==========================================

use crate::engine::cancel::CancelToken;
use crate::engine::candidate::{cmp_density_desc, Candidate, KnapsackItem};
use crate::engine::error::{PlanningError, PlanningResult};
use tracing::debug;

/// 分支定界结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BnbOutcome {
    pub candidate: Candidate,
    /// 搜索是否完整结束（完整结束即为最优解）
    pub complete: bool,
    /// 展开的搜索步数
    pub steps: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    Include,
    Exclude,
    Done,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    level: usize,
    weight: i64,
    value: i64,
    next: Branch,
}

/// 分数松弛上界
///
/// `sorted` 已按密度降序; 从 level 开始装, 装不下的那件按比例计入
fn fractional_bound(sorted: &[KnapsackItem], level: usize, weight: i64, value: i64, capacity: i64) -> i64 {
    let mut remaining = capacity - weight;
    let mut bound = value;
    for item in &sorted[level..] {
        if item.weight <= remaining {
            remaining -= item.weight;
            bound += item.value;
        } else {
            let part = item.value as i128 * remaining as i128 / item.weight as i128;
            bound += part as i64;
            break;
        }
    }
    bound
}

/// 分支定界求解
///
/// # 返回
/// - `Ok(outcome)`: complete=false 表示被取消, candidate 为截止时的最优解
/// - `Err(TimedOut)`: 被取消且尚未找到任何非空可行解
pub fn branch_and_bound(
    items: &[KnapsackItem],
    capacity: i64,
    token: &CancelToken,
    poll_interval: u64,
) -> PlanningResult<BnbOutcome> {
    if capacity <= 0 || items.is_empty() {
        return Ok(BnbOutcome {
            candidate: Candidate::empty(),
            complete: true,
            steps: 0,
        });
    }

    let poll_interval = poll_interval.max(1);

    // sorted[k] = 密度第 k 高的物品, positions[k] = 它在 items 中的位置
    let mut positions: Vec<usize> = (0..items.len())
        .filter(|&i| items[i].weight > 0 && items[i].weight <= capacity && items[i].value >= 0)
        .collect();
    positions.sort_by(|&a, &b| cmp_density_desc(&items[a], &items[b]));
    let sorted: Vec<KnapsackItem> = positions.iter().map(|&p| items[p]).collect();
    let n = sorted.len();

    let mut chosen = vec![false; n];
    let mut best_value = 0i64;
    let mut incumbent: Option<Vec<usize>> = None;

    let mut stack = vec![Frame {
        level: 0,
        weight: 0,
        value: 0,
        next: Branch::Include,
    }];
    let mut steps: u64 = 0;
    let mut cancelled = false;

    while let Some(top) = stack.last().copied() {
        steps += 1;
        if steps % poll_interval == 0 && token.is_cancelled() {
            cancelled = true;
            break;
        }

        let depth = stack.len() - 1;
        if top.level == n {
            stack.pop();
            continue;
        }

        match top.next {
            Branch::Include => {
                stack[depth].next = Branch::Exclude;
                let item = sorted[top.level];
                if top.weight + item.weight > capacity {
                    continue;
                }
                chosen[top.level] = true;
                let level = top.level + 1;
                let weight = top.weight + item.weight;
                let value = top.value + item.value;

                if value > best_value {
                    best_value = value;
                    incumbent = Some(
                        (0..level)
                            .filter(|&k| chosen[k])
                            .map(|k| positions[k])
                            .collect(),
                    );
                }
                if fractional_bound(&sorted, level, weight, value, capacity) > best_value {
                    stack.push(Frame {
                        level,
                        weight,
                        value,
                        next: Branch::Include,
                    });
                }
            }
            Branch::Exclude => {
                stack[depth].next = Branch::Done;
                chosen[top.level] = false;
                let level = top.level + 1;
                if fractional_bound(&sorted, level, top.weight, top.value, capacity) > best_value {
                    stack.push(Frame {
                        level,
                        weight: top.weight,
                        value: top.value,
                        next: Branch::Include,
                    });
                }
            }
            Branch::Done => {
                chosen[top.level] = false;
                stack.pop();
            }
        }
    }

    debug!(steps, best_value, cancelled, items = n, "分支定界结束");

    match incumbent {
        Some(picks) => Ok(BnbOutcome {
            candidate: Candidate::from_picks(items, picks),
            complete: !cancelled,
            steps,
        }),
        None if cancelled => Err(PlanningError::TimedOut(format!(
            "分支定界在 {} 步后取消, 尚无可行解",
            steps
        ))),
        None => Ok(BnbOutcome {
            candidate: Candidate::empty(),
            complete: true,
            steps,
        }),
    }
}
