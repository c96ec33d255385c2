// ==========================================
// 配送计划优化系统 - 装载规划器
// ==========================================
// 职责: 在精确求解与启发式求解之间选择, 并在结果为空时单件兜底
// 策略: n × (W+1) <= exact_cell_limit 时使用精确求解, 否则使用启发式
// 红线: 精确求解结束时请求已超时, 结果丢弃并返回错误（不做部分结果回收）
// 红线: 启发式求解在时限内取已得到的最优解, 超时不向调用方报错
// 红线: 只要存在一件可装入的订单, 就不返回空计划
// ==========================================

use crate::domain::order::Order;
use crate::domain::plan::DeliveryPlan;
use crate::domain::types::SolveMethod;
use crate::engine::buffer_pool::BufferPool;
use crate::engine::cancel::CancelToken;
use crate::engine::candidate::{collect_items, single_item_fallback, Candidate, KnapsackItem};
use crate::engine::error::{PlanningError, PlanningResult};
use crate::engine::heuristic::{HeuristicConfig, HeuristicSuite};
use crate::engine::knapsack::{dp_cells, dp_width, ExactSolver};
use tracing::{debug, instrument};

/// 精确求解规模上限默认值（DP 单元数）
pub const DEFAULT_EXACT_CELL_LIMIT: u64 = 20_000_000;

/// 规划器配置
#[derive(Debug, Clone)]
pub struct PlannerOptions {
    pub exact_cell_limit: u64,
    pub heuristic: HeuristicConfig,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            exact_cell_limit: DEFAULT_EXACT_CELL_LIMIT,
            heuristic: HeuristicConfig::default(),
        }
    }
}

/// 规划结果: 计划 + 求解方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    pub plan: DeliveryPlan,
    pub method: SolveMethod,
}

// ==========================================
// DeliveryPlanner
// ==========================================
pub struct DeliveryPlanner<'p> {
    buffers: &'p BufferPool,
    exact_cell_limit: u64,
    suite: HeuristicSuite,
}

impl<'p> DeliveryPlanner<'p> {
    pub fn new(buffers: &'p BufferPool, options: PlannerOptions) -> Self {
        Self {
            buffers,
            exact_cell_limit: options.exact_cell_limit,
            suite: HeuristicSuite::new(options.heuristic),
        }
    }

    /// 是否使用精确求解（按收紧后的 DP 宽度计算规模）
    pub fn use_exact(&self, items: &[KnapsackItem], capacity: i64) -> bool {
        let width = dp_width(items, capacity);
        dp_cells(items.len(), width) <= self.exact_cell_limit
            && ExactSolver::supports(items.len(), width)
    }

    /// 为一辆车生成装载计划
    ///
    /// # 参数
    /// - `robot_id`: 车辆ID（仅作为计划标签）
    /// - `orders`: 候选订单（任意顺序, 不可装入的会被过滤）
    /// - `capacity`: 载重上限
    /// - `token`: 请求级取消令牌
    ///
    /// # 返回
    /// - `Ok(PlanOutcome)`: 计划可能为空
    /// - `Err(TimedOut)`: 走精确求解且请求已超时（启发式路径不返回该错误）
    #[instrument(skip(self, orders, token), fields(n = orders.len()))]
    pub fn plan(
        &self,
        robot_id: &str,
        orders: &[Order],
        capacity: i64,
        token: &CancelToken,
    ) -> PlanningResult<PlanOutcome> {
        if capacity <= 0 {
            return Ok(empty_outcome(robot_id));
        }
        let items = collect_items(orders, capacity);
        if items.is_empty() {
            return Ok(empty_outcome(robot_id));
        }

        let exact = if self.use_exact(&items, capacity) {
            if token.is_cancelled() {
                return Err(PlanningError::TimedOut("精确求解开始前请求已超时".to_string()));
            }
            ExactSolver::new(self.buffers).solve(&items, capacity)
        } else {
            None
        };

        let (candidate, method) = match exact {
            Some(candidate) => {
                if token.is_cancelled() {
                    return Err(PlanningError::TimedOut(format!(
                        "精确求解超出请求时限 (n={}, capacity={})",
                        items.len(),
                        capacity
                    )));
                }
                (candidate, SolveMethod::Exact)
            }
            None => {
                // 令牌已取消时各阶段直接跳过, 仍返回种子解
                let outcome = self.suite.solve(&items, capacity, token);
                (outcome.candidate, SolveMethod::Heuristic)
            }
        };

        let (candidate, method) = if candidate.is_empty() {
            match single_item_fallback(&items) {
                Some(pos) => {
                    debug!(position = pos, "主求解结果为空, 单件兜底");
                    (Candidate::from_picks(&items, vec![pos]), SolveMethod::Fallback)
                }
                None => (candidate, SolveMethod::Empty),
            }
        } else {
            (candidate, method)
        };

        Ok(PlanOutcome {
            plan: build_plan(robot_id, orders, &items, &candidate),
            method,
        })
    }
}

fn empty_outcome(robot_id: &str) -> PlanOutcome {
    PlanOutcome {
        plan: DeliveryPlan::empty(robot_id),
        method: SolveMethod::Empty,
    }
}

/// 候选解 -> 配送计划（订单按 order_id 升序）
fn build_plan(
    robot_id: &str,
    orders: &[Order],
    items: &[KnapsackItem],
    candidate: &Candidate,
) -> DeliveryPlan {
    let mut selected: Vec<Order> = candidate
        .order_indices(items)
        .into_iter()
        .map(|i| orders[i].clone())
        .collect();
    selected.sort_by_key(|o| o.order_id);
    DeliveryPlan::from_orders(robot_id, selected)
}
