// ==========================================
// 配送计划优化系统 - 协作式取消令牌
// ==========================================
// 职责: 在搜索循环中按固定步数轮询, 替代计时器中断线程
// 说明: 子令牌继承父令牌的取消状态, 可附加更短的截止时间
// ==========================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct TokenState {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<CancelToken>,
}

/// 取消令牌（克隆后共享同一状态）
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<TokenState>,
}

impl CancelToken {
    /// 无截止时间的令牌, 只能被显式取消
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// 带超时的根令牌
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Instant::now().checked_add(timeout), None)
    }

    /// 带绝对截止时间的根令牌
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(Some(deadline), None)
    }

    /// 派生子令牌: 父令牌取消或超时时子令牌同样视为取消
    pub fn child(&self) -> Self {
        Self::build(None, Some(self.clone()))
    }

    /// 派生带独立时间盒的子令牌
    ///
    /// 取消子令牌不影响父令牌
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        Self::build(Instant::now().checked_add(timeout), Some(self.clone()))
    }

    fn build(deadline: Option<Instant>, parent: Option<CancelToken>) -> Self {
        Self {
            state: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                deadline,
                parent,
            }),
        }
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    /// 是否已取消（显式取消 / 超过截止时间 / 父令牌取消）
    pub fn is_cancelled(&self) -> bool {
        if self.state.cancelled.load(Ordering::Acquire) {
            return true;
        }
        if let Some(deadline) = self.state.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        match &self.state.parent {
            Some(parent) => parent.is_cancelled(),
            None => false,
        }
    }

    /// 有效截止时间（自身与祖先中最早者）
    pub fn deadline(&self) -> Option<Instant> {
        let parent_deadline = self.state.parent.as_ref().and_then(|p| p.deadline());
        match (self.state.deadline, parent_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// 剩余时间（无截止时间返回 None, 已过期返回 0）
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
