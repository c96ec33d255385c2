// ==========================================
// 配送计划优化系统 - 订单状态生命周期
// ==========================================
// 状态机: 可配送 → 配送中 → 已送达
// 红线: 不允许跳过状态, 已送达为终态, 不存在回到可配送的路径
// 红线: 批量转换全部成功或全部失败（由调用方事务保证）
// 副作用: 送达后补货; 缓存失效由版本号推进隐式完成
// ==========================================

use crate::domain::order::Order;
use crate::domain::types::ShipmentStatus;
use crate::engine::replenish::Replenisher;
use crate::repository::{RepositoryError, RepositoryResult, TxStore};
use tracing::{info, warn};

/// 目标状态的唯一前驱（可配送没有前驱）
pub fn predecessor(target: ShipmentStatus) -> Option<ShipmentStatus> {
    match target {
        ShipmentStatus::Eligible => None,
        ShipmentStatus::InTransit => Some(ShipmentStatus::Eligible),
        ShipmentStatus::Delivered => Some(ShipmentStatus::InTransit),
    }
}

/// 状态转换结果
#[derive(Debug, Clone, Default)]
pub struct TransitionOutcome {
    pub updated: usize,
    /// 送达触发的补货订单
    pub replenished: Vec<Order>,
}

// ==========================================
// LifecycleController
// ==========================================
pub struct LifecycleController<'a> {
    replenisher: Replenisher<'a>,
}

impl<'a> LifecycleController<'a> {
    pub fn new(replenisher: Replenisher<'a>) -> Self {
        Self { replenisher }
    }

    /// 推进到目标状态, 前驱状态由状态机决定
    fn advance(
        &self,
        tx: &TxStore<'_>,
        order_ids: &[i64],
        target: ShipmentStatus,
    ) -> RepositoryResult<usize> {
        let Some(from) = predecessor(target) else {
            return Err(RepositoryError::InvalidStateTransition {
                from: "无".to_string(),
                to: target.to_string(),
                expected: order_ids.len(),
                actual: 0,
            });
        };
        tx.orders().transition_statuses(order_ids, from, target)
    }

    /// 派发: 可配送 → 配送中
    pub fn dispatch(&self, tx: &TxStore<'_>, order_ids: &[i64]) -> RepositoryResult<usize> {
        self.advance(tx, order_ids, ShipmentStatus::InTransit)
    }

    /// 送达: 配送中 → 已送达, 随后补货（补货失败不影响送达）
    pub fn complete(
        &self,
        tx: &TxStore<'_>,
        order_ids: &[i64],
        capacity_hint: i64,
    ) -> RepositoryResult<TransitionOutcome> {
        let updated = self.advance(tx, order_ids, ShipmentStatus::Delivered)?;

        let replenished = match self.replenish_after_completion(tx, capacity_hint) {
            Ok(orders) => orders,
            Err(e) => {
                warn!(error = %e, "送达后补货失败, 忽略");
                Vec::new()
            }
        };

        info!(updated, replenished = replenished.len(), "订单送达");
        Ok(TransitionOutcome {
            updated,
            replenished,
        })
    }

    fn replenish_after_completion(
        &self,
        tx: &TxStore<'_>,
        capacity_hint: i64,
    ) -> RepositoryResult<Vec<Order>> {
        let current = tx.orders().count_by_status(ShipmentStatus::Eligible)?;
        self.replenisher.replenish(tx, current, capacity_hint, false)
    }

    /// 通用入口: 转换到目标状态（前驱状态由状态机决定）
    pub fn transition(
        &self,
        tx: &TxStore<'_>,
        order_ids: &[i64],
        target: ShipmentStatus,
        capacity_hint: i64,
    ) -> RepositoryResult<TransitionOutcome> {
        match target {
            ShipmentStatus::Delivered => self.complete(tx, order_ids, capacity_hint),
            _ => Ok(TransitionOutcome {
                updated: self.advance(tx, order_ids, target)?,
                replenished: Vec::new(),
            }),
        }
    }
}
