// ==========================================
// 配送计划优化系统 - 配送计划领域模型
// ==========================================
// 红线: total_weight / total_value 必须始终等于 orders 的合计
// 红线: 空计划的 orders 为空数组, 不是缺失
// ==========================================

use crate::domain::order::Order;
use serde::{Deserialize, Serialize};

// ==========================================
// DeliveryPlan - 配送计划
// ==========================================
// 计划只在请求内临时产生, 除计划缓存外不持久化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPlan {
    pub robot_id: String,   // 车辆ID
    pub total_weight: i64,  // 已选订单重量合计
    pub total_value: i64,   // 已选订单价值合计 (优化目标)
    pub orders: Vec<Order>, // 已选订单
}

impl DeliveryPlan {
    /// 创建空计划
    pub fn empty(robot_id: &str) -> Self {
        Self {
            robot_id: robot_id.to_string(),
            total_weight: 0,
            total_value: 0,
            orders: Vec::new(),
        }
    }

    /// 由已选订单构造计划（合计字段由订单重新计算）
    pub fn from_orders(robot_id: &str, orders: Vec<Order>) -> Self {
        let total_weight = orders.iter().map(|o| o.weight).sum();
        let total_value = orders.iter().map(|o| o.value).sum();
        Self {
            robot_id: robot_id.to_string(),
            total_weight,
            total_value,
            orders,
        }
    }

    /// 复制一份并改写车辆ID（求解结果与车辆无关, 仅标签不同）
    pub fn retarget(&self, robot_id: &str) -> Self {
        Self {
            robot_id: robot_id.to_string(),
            ..self.clone()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn order_ids(&self) -> Vec<i64> {
        self.orders.iter().map(|o| o.order_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ShipmentStatus;

    fn order(order_id: i64, weight: i64, value: i64) -> Order {
        Order {
            order_id,
            user_id: 1,
            product_id: order_id,
            weight,
            value,
            status: ShipmentStatus::Eligible,
            created_at: None,
            arrived_at: None,
        }
    }

    #[test]
    fn test_empty_plan_has_zero_totals() {
        let plan = DeliveryPlan::empty("R1");
        assert_eq!(plan.total_weight, 0);
        assert_eq!(plan.total_value, 0);
        assert!(plan.orders.is_empty());

        // 序列化后 orders 必须是 [] 而不是 null
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["orders"], serde_json::json!([]));
    }

    #[test]
    fn test_totals_follow_orders() {
        let plan = DeliveryPlan::from_orders("R1", vec![order(2, 4, 40), order(4, 3, 50)]);
        assert_eq!(plan.total_weight, 7);
        assert_eq!(plan.total_value, 90);
        assert_eq!(plan.order_ids(), vec![2, 4]);
    }

    #[test]
    fn test_retarget_only_changes_label() {
        let plan = DeliveryPlan::from_orders("R1", vec![order(1, 5, 10)]);
        let other = plan.retarget("R2");
        assert_eq!(other.robot_id, "R2");
        assert_eq!(other.orders, plan.orders);
        assert_eq!(other.total_value, plan.total_value);
    }
}
