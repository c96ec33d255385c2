// ==========================================
// 配送计划优化系统 - 配送计划 API
// ==========================================
// 职责: 生成/预览装载计划, 订单状态流转
// 流程: 读版本 → 查缓存 → 取可配送订单 → 补货 → 求解 → 写缓存 → 派发
// 红线: 取数/补货/求解/派发在同一事务内, 两个并发请求不会派发同一订单
// 红线: 精确求解超时则丢弃并回滚, 订单保持可配送; 启发式结果按时限内最优解照常提交
// 红线: 异步调用返回的结果与事务实际提交的结果一致
// ==========================================

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::order::Order;
use crate::domain::plan::DeliveryPlan;
use crate::domain::types::{ShipmentStatus, SolveMethod};
use crate::engine::buffer_pool::BufferPoolStats;
use crate::engine::cancel::CancelToken;
use crate::engine::events::{OptionalEventPublisher, PoolEvent, PoolEventPublisher, PoolEventType};
use crate::engine::lifecycle::{LifecycleController, TransitionOutcome};
use crate::engine::plan_cache::PlanCacheStats;
use crate::engine::planner::{DeliveryPlanner, PlannerOptions};
use crate::engine::pool_state::PoolState;
use crate::engine::replenish::{merge_orders, ReplenishPolicy, Replenisher};
use crate::perf::PerfGuard;
use crate::repository::{Store, TxStore};

// ==========================================
// 响应类型
// ==========================================

/// 计划响应
#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub request_id: String,
    pub plan: DeliveryPlan,
    pub method: SolveMethod,
    /// 计算开始前读取的订单池版本号
    pub pool_version: u64,
    /// 是否已把计划内订单转为配送中
    pub dispatched: bool,
    /// 本次请求补货生成的订单数
    pub replenished: usize,
    pub elapsed_ms: u64,
}

/// 状态流转响应
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdateResponse {
    pub request_id: String,
    pub updated: usize,
    pub replenished: usize,
    pub pool_version: u64,
}

/// 订单池运行统计
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatsResponse {
    pub pool_version: u64,
    pub eligible_orders: usize,
    pub in_transit_orders: usize,
    pub plan_cache: PlanCacheStats,
    pub buffers_reused: u64,
    pub buffers_allocated: u64,
}

/// 事务内规划结果
struct PlanningRun {
    plan: DeliveryPlan,
    method: SolveMethod,
    replenished: Vec<Order>,
}

// ==========================================
// DeliveryApi - 配送计划 API
// ==========================================
pub struct DeliveryApi {
    store: Store,
    pool_state: Arc<PoolState>,
    planner_options: PlannerOptions,
    replenish_policy: ReplenishPolicy,
    request_timeout: Duration,
    event_publisher: OptionalEventPublisher,
}

impl DeliveryApi {
    /// 创建新的 DeliveryApi 实例
    pub fn new(
        store: Store,
        pool_state: Arc<PoolState>,
        planner_options: PlannerOptions,
        replenish_policy: ReplenishPolicy,
        request_timeout: Duration,
        event_publisher: Option<Arc<dyn PoolEventPublisher>>,
    ) -> Self {
        let event_publisher = match event_publisher {
            Some(p) => OptionalEventPublisher::with_publisher(p),
            None => OptionalEventPublisher::none(),
        };

        Self {
            store,
            pool_state,
            planner_options,
            replenish_policy,
            request_timeout,
            event_publisher,
        }
    }

    fn replenisher(&self) -> Replenisher<'_> {
        Replenisher::new(self.replenish_policy, self.pool_state.catalog())
    }

    // ==========================================
    // 计划生成
    // ==========================================

    /// 生成配送计划并派发（计划内订单转为配送中）
    ///
    /// # 参数
    /// - robot_id: 车辆ID
    /// - capacity: 载重上限（<= 0 时返回空计划）
    ///
    /// # 返回
    /// - Ok(PlanResponse): 计划可能为空
    /// - Err(ApiError::PlanningTimeout): 精确求解超时, 订单未派发
    pub fn generate_delivery_plan(&self, robot_id: &str, capacity: i64) -> ApiResult<PlanResponse> {
        let token = CancelToken::with_timeout(self.request_timeout);
        self.plan_with_token(robot_id, capacity, false, &token)
    }

    /// 预览配送计划（试算, 不派发订单）
    pub fn preview_delivery_plan(&self, robot_id: &str, capacity: i64) -> ApiResult<PlanResponse> {
        let token = CancelToken::with_timeout(self.request_timeout);
        self.plan_with_token(robot_id, capacity, true, &token)
    }

    /// 生成配送计划（异步）
    ///
    /// 阻塞求解放到 spawn_blocking 上执行; 到达请求时限时取消令牌,
    /// 并继续等待后台任务结束, 返回其实际提交或回滚的结果
    pub async fn generate_delivery_plan_async(
        self: &Arc<Self>,
        robot_id: String,
        capacity: i64,
    ) -> ApiResult<PlanResponse> {
        let token = CancelToken::with_timeout(self.request_timeout);
        let worker_token = token.clone();
        let api = Arc::clone(self);

        let mut handle = tokio::task::spawn_blocking(move || {
            api.plan_with_token(&robot_id, capacity, false, &worker_token)
        });

        let joined = match tokio::time::timeout(self.request_timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                token.cancel();
                warn!(
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "规划超过请求时限, 等待后台任务收尾"
                );
                handle.await
            }
        };

        match joined {
            Ok(result) => result,
            Err(join_err) => Err(ApiError::InternalError(format!(
                "规划任务异常退出: {}",
                join_err
            ))),
        }
    }

    /// 为多辆车并发生成计划
    ///
    /// 各车辆请求互不依赖; 同一订单至多派发给其中一辆
    pub async fn dispatch_fleet_async(
        self: &Arc<Self>,
        requests: Vec<(String, i64)>,
    ) -> Vec<ApiResult<PlanResponse>> {
        let futures = requests
            .into_iter()
            .map(|(robot_id, capacity)| self.generate_delivery_plan_async(robot_id, capacity));
        join_all(futures).await
    }

    /// 计划生成核心流程（派发与试算共用）
    #[instrument(skip(self, token), fields(request_id))]
    fn plan_with_token(
        &self,
        robot_id: &str,
        capacity: i64,
        is_dry_run: bool,
        token: &CancelToken,
    ) -> ApiResult<PlanResponse> {
        let perf = PerfGuard::new(if is_dry_run {
            "preview_delivery_plan"
        } else {
            "generate_delivery_plan"
        });
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        if robot_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("车辆ID不能为空".to_string()));
        }

        // 试算: 缓存命中时不访问数据库
        if is_dry_run {
            let version = self.pool_state.current_version();
            if let Some(plan) = self.pool_state.plan_cache().get(version, capacity, robot_id) {
                return Ok(PlanResponse {
                    request_id,
                    plan,
                    method: SolveMethod::Cached,
                    pool_version: version,
                    dispatched: false,
                    replenished: 0,
                    elapsed_ms: perf.elapsed().as_millis() as u64,
                });
            }
        }

        let (version, run) = self.store.exec_tx(|tx| -> ApiResult<(u64, PlanningRun)> {
            let version = tx.pool_version();
            let mut run = match self.pool_state.plan_cache().get(version, capacity, robot_id) {
                Some(plan) => PlanningRun {
                    plan,
                    method: SolveMethod::Cached,
                    replenished: Vec::new(),
                },
                None => {
                    let run = self.compute_plan(tx, robot_id, capacity, token)?;
                    self.pool_state.plan_cache().insert(version, capacity, &run.plan);
                    run
                }
            };

            if !is_dry_run && !run.plan.is_empty() {
                let lifecycle = LifecycleController::new(self.replenisher());
                lifecycle.dispatch(tx, &run.plan.order_ids())?;
                for order in &mut run.plan.orders {
                    order.status = ShipmentStatus::InTransit;
                }
            }
            Ok((version, run))
        })?;

        let dispatched = !is_dry_run && !run.plan.is_empty();
        self.publish_after_commit(&request_id, robot_id, &run, dispatched);

        info!(
            robot_id,
            capacity,
            method = %run.method,
            orders = run.plan.orders.len(),
            total_weight = run.plan.total_weight,
            total_value = run.plan.total_value,
            replenished = run.replenished.len(),
            dispatched,
            "配送计划完成"
        );

        Ok(PlanResponse {
            request_id,
            plan: run.plan,
            method: run.method,
            pool_version: version,
            dispatched,
            replenished: run.replenished.len(),
            elapsed_ms: perf.elapsed().as_millis() as u64,
        })
    }

    /// 缓存未命中: 取数 → 补货 → 求解 → 空计划时强制补货重试一次
    fn compute_plan(
        &self,
        tx: &TxStore<'_>,
        robot_id: &str,
        capacity: i64,
        token: &CancelToken,
    ) -> ApiResult<PlanningRun> {
        let replenisher = self.replenisher();
        let planner = DeliveryPlanner::new(self.pool_state.buffers(), self.planner_options.clone());

        let mut eligible = tx.orders().list_shipping()?;
        let mut replenished = Vec::new();

        if capacity > 0 {
            match replenisher.replenish(tx, eligible.len(), capacity, false) {
                Ok(inserted) => {
                    replenished.extend(inserted.iter().cloned());
                    merge_orders(&mut eligible, inserted);
                }
                Err(e) => warn!(error = %e, "补货失败, 使用现有订单池继续规划"),
            }
        }

        let mut outcome = planner.plan(robot_id, &eligible, capacity, token)?;

        if outcome.plan.is_empty() && capacity > 0 && replenished.is_empty() {
            match replenisher.replenish(tx, eligible.len(), capacity, true) {
                Ok(inserted) if !inserted.is_empty() => {
                    replenished.extend(inserted.iter().cloned());
                    merge_orders(&mut eligible, inserted);
                    outcome = planner.plan(robot_id, &eligible, capacity, token)?;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "强制补货失败"),
            }
        }

        Ok(PlanningRun {
            plan: outcome.plan,
            method: outcome.method,
            replenished,
        })
    }

    fn publish_after_commit(&self, request_id: &str, robot_id: &str, run: &PlanningRun, dispatched: bool) {
        let version = self.pool_state.current_version();
        if !run.replenished.is_empty() {
            let ids = run.replenished.iter().map(|o| o.order_id).collect();
            self.event_publisher.publish(
                PoolEvent::new(PoolEventType::PoolReplenished, version, ids).with_request_id(request_id),
            );
        }
        if dispatched {
            self.event_publisher.publish(
                PoolEvent::new(PoolEventType::PlanDispatched, version, run.plan.order_ids())
                    .with_robot(robot_id)
                    .with_request_id(request_id),
            );
        }
    }

    // ==========================================
    // 状态流转
    // ==========================================

    /// 更新单个订单状态（只允许前进到下一状态）
    ///
    /// # 返回
    /// - Err(NotFound): 订单不存在
    /// - Err(InvalidStateTransition): 跳过状态或已送达
    #[instrument(skip(self))]
    pub fn update_order_status(
        &self,
        order_id: i64,
        new_status: ShipmentStatus,
    ) -> ApiResult<StatusUpdateResponse> {
        let _perf = PerfGuard::new("update_order_status");
        let request_id = Uuid::new_v4().to_string();

        let outcome = self.store.exec_tx(|tx| -> ApiResult<TransitionOutcome> {
            let order = tx
                .orders()
                .find_by_id(order_id)?
                .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", order_id)))?;
            if !order.status.can_transition_to(new_status) {
                return Err(ApiError::InvalidStateTransition {
                    from: order.status.to_string(),
                    to: new_status.to_string(),
                });
            }
            let lifecycle = LifecycleController::new(self.replenisher());
            Ok(lifecycle.transition(
                tx,
                &[order_id],
                new_status,
                self.replenish_policy.default_capacity_hint,
            )?)
        })?;

        let event_type = match new_status {
            ShipmentStatus::Delivered => PoolEventType::DeliveriesCompleted,
            _ => PoolEventType::PlanDispatched,
        };
        Ok(self.finish_transition(request_id, event_type, vec![order_id], outcome))
    }

    /// 批量送达（配送中 → 已送达）, 随后补货
    ///
    /// 任一订单不处于配送中时整批失败
    #[instrument(skip(self, order_ids), fields(count = order_ids.len()))]
    pub fn complete_deliveries(&self, order_ids: &[i64]) -> ApiResult<StatusUpdateResponse> {
        let _perf = PerfGuard::new("complete_deliveries");
        if order_ids.is_empty() {
            return Err(ApiError::InvalidInput("订单ID列表不能为空".to_string()));
        }
        let request_id = Uuid::new_v4().to_string();

        let outcome = self.store.exec_tx(|tx| -> ApiResult<TransitionOutcome> {
            let lifecycle = LifecycleController::new(self.replenisher());
            Ok(lifecycle.complete(tx, order_ids, self.replenish_policy.default_capacity_hint)?)
        })?;

        Ok(self.finish_transition(
            request_id,
            PoolEventType::DeliveriesCompleted,
            order_ids.to_vec(),
            outcome,
        ))
    }

    fn finish_transition(
        &self,
        request_id: String,
        event_type: PoolEventType,
        order_ids: Vec<i64>,
        outcome: TransitionOutcome,
    ) -> StatusUpdateResponse {
        let version = self.pool_state.current_version();
        self.event_publisher
            .publish(PoolEvent::new(event_type, version, order_ids).with_request_id(&request_id));
        if !outcome.replenished.is_empty() {
            let ids = outcome.replenished.iter().map(|o| o.order_id).collect();
            self.event_publisher.publish(
                PoolEvent::new(PoolEventType::PoolReplenished, version, ids).with_request_id(&request_id),
            );
        }

        StatusUpdateResponse {
            request_id,
            updated: outcome.updated,
            replenished: outcome.replenished.len(),
            pool_version: version,
        }
    }

    // ==========================================
    // 诊断
    // ==========================================

    pub fn pool_stats(&self) -> ApiResult<PoolStatsResponse> {
        let (eligible, in_transit) = self.store.exec_tx(|tx| -> ApiResult<(usize, usize)> {
            Ok((
                tx.orders().count_by_status(ShipmentStatus::Eligible)?,
                tx.orders().count_by_status(ShipmentStatus::InTransit)?,
            ))
        })?;
        let BufferPoolStats {
            reused, allocated, ..
        } = self.pool_state.buffers().stats();

        Ok(PoolStatsResponse {
            pool_version: self.pool_state.current_version(),
            eligible_orders: eligible,
            in_transit_orders: in_transit,
            plan_cache: self.pool_state.plan_cache().stats(),
            buffers_reused: reused,
            buffers_allocated: allocated,
        })
    }
}
