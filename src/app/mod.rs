// ==========================================
// 配送计划优化系统 - 应用层
// ==========================================
// 职责: 进程级装配, 连接命令行与 API
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
