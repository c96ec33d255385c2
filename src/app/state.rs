// ==========================================
// 配送计划优化系统 - 应用状态
// ==========================================
// 职责: 进程级装配, 订单池共享状态只构造一次并注入各 API
// ==========================================

use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{DeliveryApi, OrderApi};
use crate::config::{ConfigManager, PlannerConfig};
use crate::engine::events::PoolEventPublisher;
use crate::engine::pool_state::PoolState;
use crate::importer::CatalogImporter;
use crate::repository::{PoolVersion, Store};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 生效的规划参数
    pub config: PlannerConfig,

    /// 订单池共享状态（版本号 / 计划缓存 / 缓冲池 / 轻量商品缓存）
    pub pool_state: Arc<PoolState>,

    pub store: Store,

    pub config_manager: Arc<ConfigManager>,

    /// 配送计划API
    pub delivery_api: Arc<DeliveryApi>,

    /// 订单API
    pub order_api: Arc<OrderApi>,

    /// 商品目录导入
    pub catalog_importer: Arc<CatalogImporter>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（":memory:" 为内存库）
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_publisher(db_path, None)
    }

    /// 创建AppState并挂接事件发布者
    pub fn with_publisher(
        db_path: String,
        event_publisher: Option<Arc<dyn PoolEventPublisher>>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 版本号由 Store 与 PoolState 共享
        let pool_version = Arc::new(PoolVersion::new());
        let store = if db_path == ":memory:" {
            Store::open_in_memory(pool_version.clone())
        } else {
            Store::open(&db_path, pool_version.clone())
        }
        .map_err(|e| format!("无法打开数据库: {}", e))?;

        let config_manager = Arc::new(ConfigManager::from_connection(store.connection()));
        let config = config_manager
            .load_planner_config()
            .map_err(|e| format!("无法读取规划参数: {}", e))?;

        let pool_state = Arc::new(PoolState::with_version(
            pool_version,
            config.pool_state_options(),
        ));

        let delivery_api = Arc::new(DeliveryApi::new(
            store.clone(),
            pool_state.clone(),
            config.planner_options(),
            config.replenish_policy(),
            config.request_timeout(),
            event_publisher.clone(),
        ));
        let order_api = Arc::new(OrderApi::new(store.clone(), event_publisher));
        let catalog_importer = Arc::new(CatalogImporter::new(store.clone(), pool_state.clone()));

        tracing::info!(
            request_timeout_ms = config.request_timeout_ms,
            exact_cell_limit = config.exact_cell_limit,
            plan_cache_capacity = config.plan_cache_capacity,
            pool_target = config.pool_target,
            "AppState初始化完成"
        );

        Ok(Self {
            db_path,
            config,
            pool_state,
            store,
            config_manager,
            delivery_api,
            order_api,
            catalog_importer,
        })
    }
}

/// 默认数据库路径
///
/// 优先级: 环境变量 DELIVERY_PLANNER_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("DELIVERY_PLANNER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./delivery_planner.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        let dir = data_dir.join("delivery-planner-dev");

        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("delivery-planner");

        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("delivery_planner.db");
        }
    }

    path.to_string_lossy().to_string()
}
