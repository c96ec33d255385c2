// ==========================================
// 配送计划优化系统 - 动态规划缓冲池
// ==========================================
// 职责: 复用精确求解器的 best / last_choice / 选择链 arena
// 红线: 缓冲区借出期间只属于一个求解调用
// 红线: 借出前与归还时都必须清零
// ==========================================

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

/// 选择链空指针
pub const NIL: u32 = u32::MAX;

/// 归还时 arena 最多保留的节点容量
const ARENA_RETAIN_NODES: usize = 1 << 20;

/// 选择链节点: 本次加入的物品下标 + 剩余重量处的前驱节点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceNode {
    pub item: u32,
    pub prev: u32,
}

/// 一次精确求解所需的全部临时存储
#[derive(Debug, Default)]
pub struct DpBuffers {
    pub best: Vec<i64>,
    pub last_choice: Vec<u32>,
    pub arena: Vec<ChoiceNode>,
}

impl DpBuffers {
    fn reset(&mut self, slots: usize) {
        self.best.clear();
        self.best.resize(slots, 0);
        self.last_choice.clear();
        self.last_choice.resize(slots, NIL);
        self.arena.clear();
    }

    fn scrub(&mut self) {
        self.best.iter_mut().for_each(|v| *v = 0);
        self.last_choice.iter_mut().for_each(|v| *v = NIL);
        self.arena.clear();
        if self.arena.capacity() > ARENA_RETAIN_NODES {
            self.arena.shrink_to(ARENA_RETAIN_NODES);
        }
    }
}

/// 缓冲池统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferPoolStats {
    pub reused: u64,
    pub allocated: u64,
    pub idle: usize,
}

// ==========================================
// BufferPool
// ==========================================
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<DpBuffers>>,
    max_idle: usize,
    reused: AtomicU64,
    allocated: AtomicU64,
}

impl BufferPool {
    /// # 参数
    /// - `max_idle`: 空闲缓冲区上限, 超出部分归还时直接释放
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_idle,
            reused: AtomicU64::new(0),
            allocated: AtomicU64::new(0),
        }
    }

    /// 借出至少 `slots` 个槽位的已清零缓冲区
    ///
    /// 优先复用容量足够的空闲缓冲区, 否则复用任意一个并扩容
    pub fn acquire(&self, slots: usize) -> BufferGuard<'_> {
        let recycled = {
            let mut free = self.free.lock();
            let fit = free.iter().position(|b| b.best.capacity() >= slots);
            match fit {
                Some(idx) => Some(free.swap_remove(idx)),
                None => free.pop(),
            }
        };

        let mut buffers = match recycled {
            Some(b) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                b
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                DpBuffers::default()
            }
        };
        buffers.reset(slots);

        BufferGuard {
            pool: self,
            buffers: Some(buffers),
        }
    }

    fn release(&self, mut buffers: DpBuffers) {
        buffers.scrub();
        let mut free = self.free.lock();
        if free.len() < self.max_idle {
            free.push(buffers);
        }
    }

    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            reused: self.reused.load(Ordering::Relaxed),
            allocated: self.allocated.load(Ordering::Relaxed),
            idle: self.free.lock().len(),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(8)
    }
}

/// 借出凭证, 离开作用域时清零并归还
pub struct BufferGuard<'a> {
    pool: &'a BufferPool,
    buffers: Option<DpBuffers>,
}

impl Deref for BufferGuard<'_> {
    type Target = DpBuffers;

    fn deref(&self) -> &DpBuffers {
        // buffers 仅在 drop 中被取走
        match &self.buffers {
            Some(b) => b,
            None => unreachable!("buffer guard used after release"),
        }
    }
}

impl DerefMut for BufferGuard<'_> {
    fn deref_mut(&mut self) -> &mut DpBuffers {
        match &mut self.buffers {
            Some(b) => b,
            None => unreachable!("buffer guard used after release"),
        }
    }
}

impl Drop for BufferGuard<'_> {
    fn drop(&mut self) {
        if let Some(buffers) = self.buffers.take() {
            self.pool.release(buffers);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_acquire_returns_zeroed_buffers() {
        let pool = BufferPool::new(2);
        {
            let mut buf = pool.acquire(16);
            assert_eq!(buf.best.len(), 16);
            buf.best[3] = 42;
            buf.last_choice[3] = 7;
            buf.arena.push(ChoiceNode { item: 1, prev: NIL });
        }

        let buf = pool.acquire(8);
        assert_eq!(buf.best.len(), 8);
        assert!(buf.best.iter().all(|v| *v == 0));
        assert!(buf.last_choice.iter().all(|v| *v == NIL));
        assert!(buf.arena.is_empty());
    }

    #[test]
    fn test_buffers_are_reused() {
        let pool = BufferPool::new(2);
        drop(pool.acquire(100));
        drop(pool.acquire(50));
        let stats = pool.stats();
        assert_eq!(stats.allocated, 1);
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.idle, 1);
    }

    #[test]
    fn test_idle_count_is_bounded() {
        let pool = BufferPool::new(1);
        let a = pool.acquire(10);
        let b = pool.acquire(10);
        drop(a);
        drop(b);
        assert_eq!(pool.stats().idle, 1);
    }

    #[test]
    fn test_concurrent_acquire_is_exclusive() {
        let pool = Arc::new(BufferPool::new(4));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let mut buf = pool.acquire(32);
                        // 其他线程若共享同一缓冲区, 这里会读到非零值
                        assert!(buf.best.iter().all(|v| *v == 0));
                        buf.best.iter_mut().for_each(|v| *v = t + 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
