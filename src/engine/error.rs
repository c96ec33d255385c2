// ==========================================
// 配送计划优化系统 - 引擎层错误类型
// ==========================================

use crate::repository::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanningError {
    /// 时间预算耗尽且没有可用结果
    #[error("规划超时: {0}")]
    TimedOut(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type PlanningResult<T> = Result<T, PlanningError>;
