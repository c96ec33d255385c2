// ==========================================
// 配送计划优化系统 - 启发式求解编排
// ==========================================
// 流程:
// 1. 运行全部种子策略, 取最优（价值密度贪心始终参与, 作为质量下限）
// 2. 在独立时间盒内运行分支定界, 严格更优才替换
// 3. 在独立时间盒内对当前最优解做局部搜索
// 说明: 策略选择是确定的, 时间盒截断位置可能不同, 结果价值 >= 密度贪心
// ==========================================

use crate::engine::branch_and_bound::branch_and_bound;
use crate::engine::cancel::CancelToken;
use crate::engine::candidate::{Candidate, KnapsackItem};
use crate::engine::error::PlanningError;
use crate::engine::local_search::{improve, LocalSearchParams};
use crate::engine::strategies::SeedStrategy;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// 启发式求解配置
#[derive(Debug, Clone)]
pub struct HeuristicConfig {
    pub strategies: Vec<SeedStrategy>,
    pub bnb_enabled: bool,
    pub bnb_budget: Duration,
    pub bnb_poll_interval: u64,
    pub local_search_enabled: bool,
    pub local_search_budget: Duration,
    pub local_search_max_rounds: usize,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            strategies: SeedStrategy::ALL.to_vec(),
            bnb_enabled: true,
            bnb_budget: Duration::from_millis(1000),
            bnb_poll_interval: 4096,
            local_search_enabled: true,
            local_search_budget: Duration::from_millis(500),
            local_search_max_rounds: 1000,
        }
    }
}

/// 候选解来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Seed(SeedStrategy),
    BranchAndBound { complete: bool },
    LocalSearch,
}

#[derive(Debug, Clone)]
pub struct SuiteOutcome {
    pub candidate: Candidate,
    pub source: CandidateSource,
}

// ==========================================
// HeuristicSuite - 启发式编排器
// ==========================================
pub struct HeuristicSuite {
    config: HeuristicConfig,
}

impl HeuristicSuite {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HeuristicConfig {
        &self.config
    }

    /// 运行全部种子策略并取最优
    pub fn best_seed(&self, items: &[KnapsackItem], capacity: i64) -> (Candidate, SeedStrategy) {
        let mut best = SeedStrategy::ValueDensity.seed(items, capacity);
        let mut best_strategy = SeedStrategy::ValueDensity;

        for &strategy in &self.config.strategies {
            if strategy == SeedStrategy::ValueDensity {
                continue;
            }
            let candidate = strategy.seed(items, capacity);
            debug!(strategy = %strategy, value = candidate.value, weight = candidate.weight, "种子策略");
            if candidate.better_than(&best) {
                best = candidate;
                best_strategy = strategy;
            }
        }
        (best, best_strategy)
    }

    /// 求解
    ///
    /// # 参数
    /// - `token`: 请求级取消令牌, 各阶段在其下派生自己的时间盒
    #[instrument(skip(self, items, token), fields(n = items.len()))]
    pub fn solve(&self, items: &[KnapsackItem], capacity: i64, token: &CancelToken) -> SuiteOutcome {
        let (seed, strategy) = self.best_seed(items, capacity);
        let mut outcome = SuiteOutcome {
            candidate: seed,
            source: CandidateSource::Seed(strategy),
        };
        if capacity <= 0 || items.is_empty() {
            return outcome;
        }

        let mut proven_optimal = false;
        if self.config.bnb_enabled && !token.is_cancelled() {
            let bnb_token = token.child_with_timeout(self.config.bnb_budget);
            match branch_and_bound(items, capacity, &bnb_token, self.config.bnb_poll_interval) {
                Ok(bnb) => {
                    proven_optimal = bnb.complete;
                    if bnb.candidate.better_than(&outcome.candidate) {
                        outcome = SuiteOutcome {
                            candidate: bnb.candidate,
                            source: CandidateSource::BranchAndBound {
                                complete: bnb.complete,
                            },
                        };
                    }
                }
                Err(PlanningError::TimedOut(reason)) => {
                    debug!(%reason, "分支定界超时, 保留贪心结果");
                }
                Err(e) => {
                    warn!(error = %e, "分支定界失败, 保留贪心结果");
                }
            }
        }

        if self.config.local_search_enabled && !proven_optimal && !token.is_cancelled() {
            let ls_token = token.child_with_timeout(self.config.local_search_budget);
            let params = LocalSearchParams {
                max_rounds: self.config.local_search_max_rounds,
                poll_interval: self.config.bnb_poll_interval,
            };
            let refined = improve(items, capacity, &outcome.candidate, params, &ls_token);
            if refined.candidate.better_than(&outcome.candidate) {
                outcome = SuiteOutcome {
                    candidate: refined.candidate,
                    source: CandidateSource::LocalSearch,
                };
            }
        }

        debug!(
            value = outcome.candidate.value,
            weight = outcome.candidate.weight,
            source = ?outcome.source,
            "启发式求解完成"
        );
        outcome
    }
}

impl Default for HeuristicSuite {
    fn default() -> Self {
        Self::new(HeuristicConfig::default())
    }
}
