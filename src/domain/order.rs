// ==========================================
// 配送计划优化系统 - 订单领域模型
// ==========================================
// 订单 = 一件待配送的货物, 重量/价值取自所引用的商品
// ==========================================

use crate::domain::types::ShipmentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Order - 配送订单
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,                     // 订单ID
    pub user_id: i64,                      // 下单客户ID
    pub product_id: i64,                   // 商品ID
    pub weight: i64,                       // 重量 (取自商品)
    pub value: i64,                        // 价值 (取自商品)
    pub status: ShipmentStatus,            // 配送状态
    pub created_at: Option<DateTime<Utc>>, // 创建时间
    pub arrived_at: Option<DateTime<Utc>>, // 送达时间
}

impl Order {
    /// 是否可以参与装载求解
    ///
    /// 红线: 重量 <= 0 或价值 < 0 的订单永远不会被选中
    pub fn is_dispatchable(&self) -> bool {
        self.weight > 0 && self.value >= 0
    }

    /// 是否可以装入给定载重的车辆
    pub fn fits(&self, capacity: i64) -> bool {
        self.is_dispatchable() && self.weight <= capacity
    }
}

// ==========================================
// NewOrder - 待写入订单
// ==========================================
// 用途: 客户下单 / 补货生成, 写入时状态固定为可配送
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: i64,
    pub product_id: i64,
}

// ==========================================
// OrderRequestItem - 客户下单明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequestItem {
    pub product_id: i64,
    pub quantity: u32,
}
