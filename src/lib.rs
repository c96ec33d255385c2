// ==========================================
// 配送计划优化系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 载重约束下的订单装载决策 (0/1 背包)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 求解 / 缓存 / 补货 / 状态生命周期
pub mod engine;

// 导入层 - 商品目录
pub mod importer;

// 配置层 - 规划参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 性能统计
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 进程级装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ShipmentStatus, SolveMethod};

// 领域实体
pub use domain::{DeliveryPlan, NewOrder, NewProduct, Order, OrderRequestItem, Product};

// 引擎
pub use engine::{
    CancelToken, DeliveryPlanner, ExactSolver, HeuristicSuite, PlanCache, PlannerOptions,
    PoolState, SeedStrategy,
};

// API
pub use api::{ApiError, ApiResult, DeliveryApi, OrderApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "配送计划优化系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
