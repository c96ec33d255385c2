// ==========================================
// 配送计划优化系统 - 计划缓存
// ==========================================
// 键: (订单池版本号, 载重); 值: 与车辆无关的装载计划
// 失效: 版本号推进后旧键不会再被查询; 写入时顺带清理比写入键更旧的版本
// 淘汰: 严格 LRU, 容量为 0 时缓存关闭
// ==========================================

use crate::domain::plan::DeliveryPlan;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct CacheKey {
    version: u64,
    capacity: i64,
}

#[derive(Debug)]
struct CacheEntry {
    plan: DeliveryPlan,
    tick: u64,
}

#[derive(Debug, Default)]
struct LruState {
    entries: HashMap<CacheKey, CacheEntry>,
    recency: BTreeMap<u64, CacheKey>,
    next_tick: u64,
}

impl LruState {
    fn touch(&mut self, key: CacheKey) -> Option<&CacheEntry> {
        let tick = self.next_tick;
        let entry = self.entries.get_mut(&key)?;
        self.recency.remove(&entry.tick);
        entry.tick = tick;
        self.recency.insert(tick, key);
        self.next_tick += 1;
        self.entries.get(&key)
    }

    fn remove(&mut self, key: &CacheKey) {
        if let Some(entry) = self.entries.remove(key) {
            self.recency.remove(&entry.tick);
        }
    }
}

/// 缓存统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

// ==========================================
// PlanCache
// ==========================================
#[derive(Debug)]
pub struct PlanCache {
    capacity: usize,
    state: Mutex<LruState>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PlanCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(LruState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// 查询, 命中时返回改写为请求车辆ID的副本
    pub fn get(&self, version: u64, capacity: i64, robot_id: &str) -> Option<DeliveryPlan> {
        if !self.is_enabled() {
            return None;
        }
        let key = CacheKey { version, capacity };
        let found = {
            let mut state = self.state.lock();
            state.touch(key).map(|e| e.plan.retarget(robot_id))
        };
        match found {
            Some(plan) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(plan)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// 写入
    ///
    /// `version` 必须是计算开始前读取的版本号
    pub fn insert(&self, version: u64, capacity: i64, plan: &DeliveryPlan) {
        if !self.is_enabled() {
            return;
        }
        let key = CacheKey { version, capacity };
        let mut state = self.state.lock();

        let stale: Vec<CacheKey> = state
            .entries
            .keys()
            .filter(|k| k.version < version)
            .copied()
            .collect();
        for k in &stale {
            state.remove(k);
        }

        state.remove(&key);
        while state.entries.len() >= self.capacity {
            let oldest = match state.recency.iter().next() {
                Some((_, k)) => *k,
                None => break,
            };
            state.remove(&oldest);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        let tick = state.next_tick;
        state.next_tick += 1;
        state.recency.insert(tick, key);
        state.entries.insert(
            key,
            CacheEntry {
                plan: plan.clone(),
                tick,
            },
        );
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.recency.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> PlanCacheStats {
        PlanCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
