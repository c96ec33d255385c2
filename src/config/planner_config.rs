// ==========================================
// 配送计划优化系统 - 规划参数
// ==========================================
// 来源: config_kv (scope_id='global'), 缺省值见 Default
// 说明: 时间类参数单位为毫秒
// ==========================================

use crate::engine::heuristic::HeuristicConfig;
use crate::engine::planner::{PlannerOptions, DEFAULT_EXACT_CELL_LIMIT};
use crate::engine::pool_state::PoolStateOptions;
use crate::engine::replenish::ReplenishPolicy;
use crate::engine::strategies::SeedStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerConfig {
    // ===== 请求 =====
    pub request_timeout_ms: u64,

    // ===== 求解 =====
    pub exact_cell_limit: u64,
    pub seed_strategies: Vec<SeedStrategy>,
    pub bnb_enabled: bool,
    pub bnb_budget_ms: u64,
    pub bnb_poll_interval: u64,
    pub local_search_enabled: bool,
    pub local_search_budget_ms: u64,
    pub local_search_max_rounds: usize,

    // ===== 缓存 =====
    pub plan_cache_capacity: usize,
    pub buffer_pool_idle: usize,
    pub catalog_cache_ttl_ms: u64,

    // ===== 补货 =====
    pub pool_target: usize,
    pub replenish_batch: usize,
    pub default_capacity_hint: i64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 3000,
            exact_cell_limit: DEFAULT_EXACT_CELL_LIMIT,
            seed_strategies: SeedStrategy::ALL.to_vec(),
            bnb_enabled: true,
            bnb_budget_ms: 1000,
            bnb_poll_interval: 4096,
            local_search_enabled: true,
            local_search_budget_ms: 500,
            local_search_max_rounds: 1000,
            plan_cache_capacity: 256,
            buffer_pool_idle: 8,
            catalog_cache_ttl_ms: 30_000,
            pool_target: 200,
            replenish_batch: 50,
            default_capacity_hint: 100,
        }
    }
}

impl PlannerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn planner_options(&self) -> PlannerOptions {
        PlannerOptions {
            exact_cell_limit: self.exact_cell_limit,
            heuristic: HeuristicConfig {
                strategies: self.seed_strategies.clone(),
                bnb_enabled: self.bnb_enabled,
                bnb_budget: Duration::from_millis(self.bnb_budget_ms),
                bnb_poll_interval: self.bnb_poll_interval.max(1),
                local_search_enabled: self.local_search_enabled,
                local_search_budget: Duration::from_millis(self.local_search_budget_ms),
                local_search_max_rounds: self.local_search_max_rounds,
            },
        }
    }

    pub fn replenish_policy(&self) -> ReplenishPolicy {
        ReplenishPolicy {
            pool_target: self.pool_target,
            batch: self.replenish_batch,
            default_capacity_hint: self.default_capacity_hint,
        }
    }

    pub fn pool_state_options(&self) -> PoolStateOptions {
        PoolStateOptions {
            plan_cache_capacity: self.plan_cache_capacity,
            buffer_pool_idle: self.buffer_pool_idle,
            catalog_cache_ttl: Duration::from_millis(self.catalog_cache_ttl_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_map_to_engine_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.replenish_policy(), ReplenishPolicy::default());

        let options = config.planner_options();
        assert_eq!(options.exact_cell_limit, DEFAULT_EXACT_CELL_LIMIT);
        assert_eq!(options.heuristic.bnb_budget, Duration::from_millis(1000));
        assert_eq!(options.heuristic.strategies.len(), SeedStrategy::ALL.len());

        let pool = config.pool_state_options();
        assert_eq!(pool.plan_cache_capacity, 256);
        assert_eq!(pool.catalog_cache_ttl, Duration::from_secs(30));
    }
}
