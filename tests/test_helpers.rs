// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库初始化、规划参数写入、测试数据生成、事件记录
// ==========================================

#![allow(dead_code)]

use delivery_planner::app::AppState;
use delivery_planner::config::{config_keys, ConfigManager};
use delivery_planner::db::{ensure_schema, open_sqlite_connection};
use delivery_planner::domain::{NewProduct, OrderRequestItem};
use delivery_planner::engine::events::{PoolEvent, PoolEventPublisher, PoolEventType};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 关闭补货（目标 0, 批量 0）, 使计划只依赖测试写入的订单
pub const NO_REPLENISH: [(&str, &str); 2] = [
    (config_keys::POOL_TARGET, "0"),
    (config_keys::REPLENISH_BATCH, "0"),
];

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().ok_or("临时路径不是 UTF-8")?.to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 写入配置后创建 AppState
pub fn create_test_state(
    config: &[(&str, &str)],
) -> (NamedTempFile, AppState, Arc<RecordingPublisher>) {
    delivery_planner::logging::init_test();
    let (temp_file, db_path) = create_test_db().unwrap();

    let manager = ConfigManager::new(&db_path).unwrap();
    for (key, value) in config {
        manager.set_global_config_value(key, value).unwrap();
    }
    drop(manager);

    let publisher = Arc::new(RecordingPublisher::default());
    let state = AppState::with_publisher(db_path, Some(publisher.clone())).unwrap();
    (temp_file, state, publisher)
}

/// 写入商品, 返回商品ID（与输入顺序一致）
pub fn seed_products(state: &AppState, products: &[(&str, i64, i64)]) -> Vec<i64> {
    let new_products: Vec<NewProduct> = products
        .iter()
        .map(|(name, weight, value)| NewProduct {
            name: name.to_string(),
            value: *value,
            weight: *weight,
            image: None,
            description: None,
        })
        .collect();

    state
        .store
        .exec_tx(|tx| -> delivery_planner::repository::RepositoryResult<Vec<i64>> {
            tx.products().upsert_batch(&new_products)?;
            let mut ids = Vec::with_capacity(new_products.len());
            for p in &new_products {
                let id: i64 = tx.connection().query_row(
                    "SELECT product_id FROM products WHERE name = ?1",
                    [&p.name],
                    |row| row.get(0),
                )?;
                ids.push(id);
            }
            Ok(ids)
        })
        .unwrap()
}

/// 每个商品下一单, 返回订单ID（与输入顺序一致）
pub fn seed_orders(state: &AppState, product_ids: &[i64]) -> Vec<i64> {
    let items: Vec<OrderRequestItem> = product_ids
        .iter()
        .map(|&product_id| OrderRequestItem {
            product_id,
            quantity: 1,
        })
        .collect();
    state.order_api.place_orders(1, &items).unwrap().order_ids
}

/// 商品 + 订单一次写入: (名称, 重量, 价值)
pub fn seed_pool(state: &AppState, products: &[(&str, i64, i64)]) -> Vec<i64> {
    let product_ids = seed_products(state, products);
    seed_orders(state, &product_ids)
}

/// 记录全部事件的发布者
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<PoolEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<PoolEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event_type: PoolEventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl PoolEventPublisher for RecordingPublisher {
    fn publish(&self, event: PoolEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.events.lock().unwrap().push(event);
        Ok(String::new())
    }
}
