// ==========================================
// 配送计划优化系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体与类型
// 红线: 不含数据访问逻辑, 不含引擎逻辑
// ==========================================

pub mod order;
pub mod plan;
pub mod product;
pub mod types;

// 重导出核心类型
pub use order::{NewOrder, Order, OrderRequestItem};
pub use plan::DeliveryPlan;
pub use product::{NewProduct, Product};
pub use types::{ShipmentStatus, SolveMethod};
