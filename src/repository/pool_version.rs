// ==========================================
// 配送计划优化系统 - 订单池版本号
// ==========================================
// 可配送集合每发生一次变更（写入/状态转换）版本号 +1
// 只增不减; 用作计划缓存的失效令牌
// ==========================================

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PoolVersion {
    counter: AtomicU64,
}

impl PoolVersion {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取当前版本号
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// 版本号 +1，返回新版本号
    ///
    /// 说明: 事务回滚时已发生的 bump 不回退，仅导致一次多余的重算
    pub fn bump(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }
}
