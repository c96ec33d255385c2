// ==========================================
// 配送计划优化系统 - 订单池补货
// ==========================================
// 职责: 可配送订单少于目标值时, 从轻量商品合成可配送订单
// 红线: 合成订单的重量不超过载重提示（超重订单永远不会被选中）
// 红线: 在调用方事务内的保存点中执行, 失败只回滚保存点
// ==========================================

use crate::domain::order::{NewOrder, Order};
use crate::domain::product::Product;
use crate::domain::types::ShipmentStatus;
use crate::repository::{RepositoryResult, TxStore};
use parking_lot::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// 补货策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplenishPolicy {
    /// 可配送订单目标数量
    pub pool_target: usize,
    /// 单次最少合成数量
    pub batch: usize,
    /// 载重提示缺省值
    pub default_capacity_hint: i64,
}

impl Default for ReplenishPolicy {
    fn default() -> Self {
        Self {
            pool_target: 200,
            batch: 50,
            default_capacity_hint: 100,
        }
    }
}

impl ReplenishPolicy {
    /// 需要合成的订单数
    ///
    /// - 未强制且当前数量已达目标: 0
    /// - 否则: max(目标 - 当前, 批量)
    pub fn needed(&self, current: usize, force: bool) -> usize {
        if !force && current >= self.pool_target {
            return 0;
        }
        self.pool_target.saturating_sub(current).max(self.batch)
    }

    pub fn effective_hint(&self, hint: i64) -> i64 {
        if hint > 0 {
            hint
        } else {
            self.default_capacity_hint
        }
    }
}

// ==========================================
// LightweightCatalogCache - 轻量商品缓存
// ==========================================
#[derive(Debug, Clone)]
struct CachedCatalog {
    hint: i64,
    products: Vec<Product>,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct LightweightCatalogCache {
    ttl: Duration,
    inner: RwLock<Option<CachedCatalog>>,
}

impl LightweightCatalogCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(None),
        }
    }

    /// 命中条件: 未过期, 缓存时的提示 >= 请求提示, 过滤后数量足够
    pub fn get(&self, hint: i64, limit: usize) -> Option<Vec<Product>> {
        let guard = self.inner.read();
        let cached = guard.as_ref()?;
        if Instant::now() >= cached.expires_at || hint > cached.hint {
            return None;
        }
        let usable: Vec<Product> = cached
            .products
            .iter()
            .filter(|p| p.weight > 0 && p.weight <= hint)
            .take(limit)
            .cloned()
            .collect();
        if usable.len() < limit {
            return None;
        }
        Some(usable)
    }

    pub fn store(&self, hint: i64, products: &[Product]) {
        *self.inner.write() = Some(CachedCatalog {
            hint,
            products: products.to_vec(),
            expires_at: Instant::now() + self.ttl,
        });
    }

    pub fn invalidate(&self) {
        *self.inner.write() = None;
    }
}

impl Default for LightweightCatalogCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

// ==========================================
// Replenisher
// ==========================================
pub struct Replenisher<'a> {
    policy: ReplenishPolicy,
    catalog: &'a LightweightCatalogCache,
}

impl<'a> Replenisher<'a> {
    pub fn new(policy: ReplenishPolicy, catalog: &'a LightweightCatalogCache) -> Self {
        Self { policy, catalog }
    }

    pub fn policy(&self) -> &ReplenishPolicy {
        &self.policy
    }

    fn lightweight_products(
        &self,
        tx: &TxStore<'_>,
        hint: i64,
        limit: usize,
    ) -> RepositoryResult<Vec<Product>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        if let Some(products) = self.catalog.get(hint, limit) {
            debug!(hint, limit, "轻量商品缓存命中");
            return Ok(products);
        }

        let fetched = tx.products().find_lightweight(hint, limit.saturating_mul(2))?;
        self.catalog.store(hint, &fetched);
        Ok(fetched.into_iter().take(limit).collect())
    }

    /// 补货
    ///
    /// # 参数
    /// - `tx`: 调用方事务
    /// - `current`: 当前可配送订单数
    /// - `capacity_hint`: 载重提示, <= 0 时使用缺省值
    /// - `force`: 忽略目标值, 至少合成一个批量
    ///
    /// # 返回
    /// - 新写入的可配送订单（已带重量/价值）
    pub fn replenish(
        &self,
        tx: &TxStore<'_>,
        current: usize,
        capacity_hint: i64,
        force: bool,
    ) -> RepositoryResult<Vec<Order>> {
        let needed = self.policy.needed(current, force);
        if needed == 0 {
            return Ok(Vec::new());
        }
        let hint = self.policy.effective_hint(capacity_hint);

        tx.savepoint("replenish", |sp| {
            let products = self.lightweight_products(sp, hint, needed)?;
            if products.is_empty() {
                debug!(hint, needed, "没有可用于补货的轻量商品");
                return Ok(Vec::new());
            }

            let new_orders: Vec<NewOrder> = products
                .iter()
                .enumerate()
                .map(|(i, p)| NewOrder {
                    user_id: 1 + (i % 100) as i64,
                    product_id: p.product_id,
                })
                .collect();
            let ids = sp.orders().batch_create(&new_orders)?;

            let inserted: Vec<Order> = ids
                .into_iter()
                .zip(new_orders.iter().zip(products.iter()))
                .map(|(order_id, (new_order, product))| Order {
                    order_id,
                    user_id: new_order.user_id,
                    product_id: new_order.product_id,
                    weight: product.weight,
                    value: product.value,
                    status: ShipmentStatus::Eligible,
                    created_at: None,
                    arrived_at: None,
                })
                .collect();

            info!(current, needed, inserted = inserted.len(), hint, "订单池补货完成");
            Ok(inserted)
        })
    }
}

/// 把补货订单并入可配送列表（按 order_id 升序）
pub fn merge_orders(existing: &mut Vec<Order>, inserted: Vec<Order>) {
    if inserted.is_empty() {
        return;
    }
    existing.extend(inserted);
    existing.sort_by_key(|o| o.order_id);
}
