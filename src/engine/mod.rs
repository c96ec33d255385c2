// ==========================================
// 配送计划优化系统 - 引擎层
// ==========================================
// 职责: 装载求解 / 计划缓存 / 补货 / 状态生命周期
// 红线: Engine 不拼 SQL, 数据访问只经由 TxStore
// ==========================================

pub mod branch_and_bound;
pub mod buffer_pool;
pub mod cancel;
pub mod candidate;
pub mod error;
pub mod events;
pub mod heuristic;
pub mod knapsack;
pub mod lifecycle;
pub mod local_search;
pub mod plan_cache;
pub mod planner;
pub mod pool_state;
pub mod replenish;
pub mod strategies;

// 重导出核心引擎
pub use buffer_pool::{BufferPool, BufferPoolStats};
pub use cancel::CancelToken;
pub use candidate::{Candidate, KnapsackItem};
pub use error::{PlanningError, PlanningResult};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, PoolEvent, PoolEventPublisher, PoolEventType,
};
pub use heuristic::{CandidateSource, HeuristicConfig, HeuristicSuite};
pub use knapsack::ExactSolver;
pub use lifecycle::{LifecycleController, TransitionOutcome};
pub use plan_cache::{PlanCache, PlanCacheStats};
pub use planner::{DeliveryPlanner, PlanOutcome, PlannerOptions};
pub use pool_state::{PoolState, PoolStateOptions};
pub use replenish::{LightweightCatalogCache, ReplenishPolicy, Replenisher};
pub use strategies::SeedStrategy;
