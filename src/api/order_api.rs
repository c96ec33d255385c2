// ==========================================
// 配送计划优化系统 - 订单 API
// ==========================================
// 职责: 客户下单（可配送订单的另一个来源）, 订单查询
// ==========================================

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::order::{NewOrder, Order, OrderRequestItem};
use crate::engine::events::{OptionalEventPublisher, PoolEvent, PoolEventPublisher, PoolEventType};
use crate::repository::Store;

/// 单次下单允许的最大件数
const MAX_ITEMS_PER_REQUEST: u64 = 10_000;

/// 下单响应
#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrdersResponse {
    pub request_id: String,
    pub order_ids: Vec<i64>,
    pub pool_version: u64,
}

// ==========================================
// OrderApi - 订单 API
// ==========================================
pub struct OrderApi {
    store: Store,
    event_publisher: OptionalEventPublisher,
}

impl OrderApi {
    pub fn new(store: Store, event_publisher: Option<Arc<dyn PoolEventPublisher>>) -> Self {
        let event_publisher = match event_publisher {
            Some(p) => OptionalEventPublisher::with_publisher(p),
            None => OptionalEventPublisher::none(),
        };
        Self {
            store,
            event_publisher,
        }
    }

    /// 客户下单
    ///
    /// # 参数
    /// - user_id: 客户ID
    /// - items: 下单明细（商品 + 数量）, 每件生成一个可配送订单
    ///
    /// # 返回
    /// - Ok(PlaceOrdersResponse): 新订单ID（按明细顺序展开）
    /// - Err(NotFound): 商品不存在, 整单不写入
    #[instrument(skip(self, items), fields(lines = items.len()))]
    pub fn place_orders(
        &self,
        user_id: i64,
        items: &[OrderRequestItem],
    ) -> ApiResult<PlaceOrdersResponse> {
        if user_id <= 0 {
            return Err(ApiError::InvalidInput(format!("客户ID无效: {}", user_id)));
        }
        if items.is_empty() {
            return Err(ApiError::InvalidInput("下单明细不能为空".to_string()));
        }
        if let Some(item) = items.iter().find(|i| i.quantity == 0) {
            return Err(ApiError::InvalidInput(format!(
                "商品{}的数量必须大于0",
                item.product_id
            )));
        }
        let total: u64 = items.iter().map(|i| u64::from(i.quantity)).sum();
        if total > MAX_ITEMS_PER_REQUEST {
            return Err(ApiError::InvalidInput(format!(
                "单次下单件数 {} 超过上限 {}",
                total, MAX_ITEMS_PER_REQUEST
            )));
        }

        let request_id = Uuid::new_v4().to_string();
        let order_ids = self.store.exec_tx(|tx| -> ApiResult<Vec<i64>> {
            let mut new_orders = Vec::with_capacity(total as usize);
            for item in items {
                if tx.products().find_by_id(item.product_id)?.is_none() {
                    return Err(ApiError::NotFound(format!(
                        "商品(id={})不存在",
                        item.product_id
                    )));
                }
                new_orders.extend((0..item.quantity).map(|_| NewOrder {
                    user_id,
                    product_id: item.product_id,
                }));
            }
            Ok(tx.orders().batch_create(&new_orders)?)
        })?;

        let version = self.store.pool_version().current();
        self.event_publisher.publish(
            PoolEvent::new(PoolEventType::OrdersPlaced, version, order_ids.clone())
                .with_request_id(&request_id),
        );
        info!(user_id, orders = order_ids.len(), "客户下单完成");

        Ok(PlaceOrdersResponse {
            request_id,
            order_ids,
            pool_version: version,
        })
    }

    /// 查询订单
    pub fn get_order(&self, order_id: i64) -> ApiResult<Order> {
        self.store
            .exec_tx(|tx| -> ApiResult<Option<Order>> { Ok(tx.orders().find_by_id(order_id)?) })?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", order_id)))
    }

    /// 当前全部可配送订单（按 order_id 升序）
    pub fn list_eligible_orders(&self) -> ApiResult<Vec<Order>> {
        Ok(self.store.exec_tx(|tx| tx.orders().list_shipping())?)
    }
}
