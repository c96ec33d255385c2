// ==========================================
// 配送计划优化系统 - 商品领域模型
// ==========================================
// 读多写少: 既供客户浏览, 也是补货时合成订单的来源
// ==========================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: i64,             // 商品ID
    pub name: String,                // 商品名称
    pub value: i64,                  // 价值
    pub weight: i64,                 // 重量
    pub image: Option<String>,       // 图片路径
    pub description: Option<String>, // 描述
}

/// 待导入商品（尚未分配ID）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub value: i64,
    pub weight: i64,
    pub image: Option<String>,
    pub description: Option<String>,
}
