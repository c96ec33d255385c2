// ==========================================
// 配送计划优化系统 - 领域类型定义
// ==========================================
// 订单生命周期: 可配送 → 配送中 → 已送达
// 数据库存储值沿用 shipped_status 字段的历史取值
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 订单配送状态 (Shipment Status)
// ==========================================
// 红线: 不允许跳过状态, 已送达为终态, 不存在回到可配送的路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Eligible,  // 可配送 (shipping)
    InTransit, // 配送中 (delivering)
    Delivered, // 已送达 (completed)
}

impl ShipmentStatus {
    /// 转换为数据库存储值
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Eligible => "shipping",
            ShipmentStatus::InTransit => "delivering",
            ShipmentStatus::Delivered => "completed",
        }
    }

    /// 从数据库存储值解析（未知值返回 None）
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "shipping" => Some(ShipmentStatus::Eligible),
            "delivering" => Some(ShipmentStatus::InTransit),
            "completed" => Some(ShipmentStatus::Delivered),
            _ => None,
        }
    }

    /// 生命周期中的下一个状态（终态返回 None）
    pub fn next(&self) -> Option<Self> {
        match self {
            ShipmentStatus::Eligible => Some(ShipmentStatus::InTransit),
            ShipmentStatus::InTransit => Some(ShipmentStatus::Delivered),
            ShipmentStatus::Delivered => None,
        }
    }

    /// 是否允许从当前状态转换到目标状态
    pub fn can_transition_to(&self, target: ShipmentStatus) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 求解方式 (Solve Method)
// ==========================================
// 用于日志与诊断, 标识计划由哪条路径产生
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveMethod {
    Empty,     // 无可用订单或载重 <= 0
    Exact,     // 动态规划精确解
    Heuristic, // 启发式组合
    Fallback,  // 单件兜底
    Cached,    // 计划缓存命中
}

impl fmt::Display for SolveMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveMethod::Empty => write!(f, "EMPTY"),
            SolveMethod::Exact => write!(f, "EXACT"),
            SolveMethod::Heuristic => write!(f, "HEURISTIC"),
            SolveMethod::Fallback => write!(f, "FALLBACK"),
            SolveMethod::Cached => write!(f, "CACHED"),
        }
    }
}
