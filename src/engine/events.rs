// ==========================================
// 配送计划优化系统 - 订单池事件发布
// ==========================================
// 职责: 定义订单池事件发布 trait，实现依赖倒置
// 说明: 事件在事务提交后发布, 发布失败只记录日志
// ==========================================

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 订单池事件类型
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolEventType {
    /// 计划已派发（订单转为配送中）
    PlanDispatched,
    /// 订单已送达
    DeliveriesCompleted,
    /// 订单池已补货
    PoolReplenished,
    /// 客户下单
    OrdersPlaced,
}

impl PoolEventType {
    pub fn as_str(&self) -> &str {
        match self {
            PoolEventType::PlanDispatched => "PlanDispatched",
            PoolEventType::DeliveriesCompleted => "DeliveriesCompleted",
            PoolEventType::PoolReplenished => "PoolReplenished",
            PoolEventType::OrdersPlaced => "OrdersPlaced",
        }
    }
}

/// 订单池事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolEvent {
    pub event_type: PoolEventType,
    /// 事件发生后的订单池版本号
    pub pool_version: u64,
    /// 相关车辆（仅派发事件）
    pub robot_id: Option<String>,
    /// 受影响的订单
    pub order_ids: Vec<i64>,
    /// 请求ID, 用于串联日志
    pub request_id: Option<String>,
}

impl PoolEvent {
    pub fn new(event_type: PoolEventType, pool_version: u64, order_ids: Vec<i64>) -> Self {
        Self {
            event_type,
            pool_version,
            robot_id: None,
            order_ids,
            request_id: None,
        }
    }

    pub fn with_robot(mut self, robot_id: &str) -> Self {
        self.robot_id = Some(robot_id.to_string());
        self
    }

    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 订单池事件发布者 Trait
///
/// # 实现说明
/// - 必须是非阻塞的: 发布在请求线程上同步调用
pub trait PoolEventPublisher: Send + Sync {
    /// 发布事件
    ///
    /// # 返回
    /// - `Ok(id)`: 下游分配的ID（如果支持）或空字符串
    fn publish(&self, event: PoolEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl PoolEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: PoolEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - event_type={}, pool_version={}, orders={}",
            event.event_type.as_str(),
            event.pool_version,
            event.order_ids.len()
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn PoolEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn PoolEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（失败只记录告警）
    pub fn publish(&self, event: PoolEvent) {
        let Some(publisher) = &self.inner else {
            return;
        };
        let event_type = event.event_type;
        if let Err(e) = publisher.publish(event) {
            tracing::warn!(event_type = event_type.as_str(), error = %e, "事件发布失败");
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
