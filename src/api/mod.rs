// ==========================================
// 配送计划优化系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供命令行与上层服务调用
// ==========================================

pub mod delivery_api;
pub mod error;
pub mod order_api;

// 重导出核心类型
pub use delivery_api::{DeliveryApi, PlanResponse, PoolStatsResponse, StatusUpdateResponse};
pub use error::{ApiError, ApiResult};
pub use order_api::{OrderApi, PlaceOrdersResponse};
