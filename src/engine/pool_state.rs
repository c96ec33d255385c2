// ==========================================
// 配送计划优化系统 - 订单池共享状态
// ==========================================
// 进程内只构造一次, 通过 Arc 注入各服务
// 版本号 / 计划缓存 / 缓冲池 / 轻量商品缓存各自独立加锁,
// 一次长时间求解不会阻塞其他载重的缓存读取或版本读取
// ==========================================

use crate::engine::buffer_pool::BufferPool;
use crate::engine::plan_cache::PlanCache;
use crate::engine::replenish::LightweightCatalogCache;
use crate::repository::PoolVersion;
use std::sync::Arc;
use std::time::Duration;

/// 共享状态容量参数
#[derive(Debug, Clone, Copy)]
pub struct PoolStateOptions {
    pub plan_cache_capacity: usize,
    pub buffer_pool_idle: usize,
    pub catalog_cache_ttl: Duration,
}

impl Default for PoolStateOptions {
    fn default() -> Self {
        Self {
            plan_cache_capacity: 256,
            buffer_pool_idle: 8,
            catalog_cache_ttl: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
pub struct PoolState {
    version: Arc<PoolVersion>,
    plan_cache: PlanCache,
    buffers: BufferPool,
    catalog: LightweightCatalogCache,
}

impl PoolState {
    pub fn new(options: PoolStateOptions) -> Self {
        Self::with_version(Arc::new(PoolVersion::new()), options)
    }

    /// 使用已有的版本号（与 Store 共享同一个计数器）
    pub fn with_version(version: Arc<PoolVersion>, options: PoolStateOptions) -> Self {
        Self {
            version,
            plan_cache: PlanCache::new(options.plan_cache_capacity),
            buffers: BufferPool::new(options.buffer_pool_idle),
            catalog: LightweightCatalogCache::new(options.catalog_cache_ttl),
        }
    }

    pub fn version(&self) -> &Arc<PoolVersion> {
        &self.version
    }

    pub fn current_version(&self) -> u64 {
        self.version.current()
    }

    pub fn plan_cache(&self) -> &PlanCache {
        &self.plan_cache
    }

    pub fn buffers(&self) -> &BufferPool {
        &self.buffers
    }

    pub fn catalog(&self) -> &LightweightCatalogCache {
        &self.catalog
    }
}

impl Default for PoolState {
    fn default() -> Self {
        Self::new(PoolStateOptions::default())
    }
}
