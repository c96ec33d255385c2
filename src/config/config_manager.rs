// ==========================================
// 配送计划优化系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// 红线: 配置值格式错误时回退到缺省值并告警, 不中止启动
// ==========================================

use crate::config::planner_config::PlannerConfig;
use crate::db::open_sqlite_connection;
use crate::engine::strategies::SeedStrategy;
use crate::repository::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    fn load_global_map(&self) -> RepositoryResult<HashMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut map = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let map = self.load_global_map()?;
        Ok(json!(map).to_string())
    }

    /// 读取规划参数
    ///
    /// 未配置的键使用缺省值; 格式错误的键记录告警后使用缺省值
    pub fn load_planner_config(&self) -> RepositoryResult<PlannerConfig> {
        let map = self.load_global_map()?;
        let d = PlannerConfig::default();

        Ok(PlannerConfig {
            request_timeout_ms: parse_or(&map, config_keys::REQUEST_TIMEOUT_MS, d.request_timeout_ms),
            exact_cell_limit: parse_or(&map, config_keys::EXACT_CELL_LIMIT, d.exact_cell_limit),
            seed_strategies: parse_strategies(&map, d.seed_strategies),
            bnb_enabled: parse_flag(&map, config_keys::BNB_ENABLED, d.bnb_enabled),
            bnb_budget_ms: parse_or(&map, config_keys::BNB_BUDGET_MS, d.bnb_budget_ms),
            bnb_poll_interval: parse_or(&map, config_keys::BNB_POLL_INTERVAL, d.bnb_poll_interval),
            local_search_enabled: parse_flag(
                &map,
                config_keys::LOCAL_SEARCH_ENABLED,
                d.local_search_enabled,
            ),
            local_search_budget_ms: parse_or(
                &map,
                config_keys::LOCAL_SEARCH_BUDGET_MS,
                d.local_search_budget_ms,
            ),
            local_search_max_rounds: parse_or(
                &map,
                config_keys::LOCAL_SEARCH_MAX_ROUNDS,
                d.local_search_max_rounds,
            ),
            plan_cache_capacity: parse_or(&map, config_keys::PLAN_CACHE_CAPACITY, d.plan_cache_capacity),
            buffer_pool_idle: parse_or(&map, config_keys::BUFFER_POOL_IDLE, d.buffer_pool_idle),
            catalog_cache_ttl_ms: parse_or(
                &map,
                config_keys::CATALOG_CACHE_TTL_MS,
                d.catalog_cache_ttl_ms,
            ),
            pool_target: parse_or(&map, config_keys::POOL_TARGET, d.pool_target),
            replenish_batch: parse_or(&map, config_keys::REPLENISH_BATCH, d.replenish_batch),
            default_capacity_hint: parse_positive(
                &map,
                config_keys::DEFAULT_CAPACITY_HINT,
                d.default_capacity_hint,
            ),
        })
    }
}

fn parse_or<T>(map: &HashMap<String, String>, key: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    let Some(raw) = map.get(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(e) => {
            warn!(config_key = key, raw_value = %raw, error = %e, default = %default, "配置值格式错误，使用缺省值");
            default
        }
    }
}

fn parse_positive(map: &HashMap<String, String>, key: &str, default: i64) -> i64 {
    let value = parse_or(map, key, default);
    if value > 0 {
        value
    } else {
        warn!(config_key = key, value, "配置值必须为正数，使用缺省值");
        default
    }
}

fn parse_flag(map: &HashMap<String, String>, key: &str, default: bool) -> bool {
    let Some(raw) = map.get(key) else {
        return default;
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(config_key = key, raw_value = %raw, "开关配置格式错误，使用缺省值");
            default
        }
    }
}

/// 逗号分隔的种子策略列表; 未知名称跳过, 结果为空时使用缺省值
fn parse_strategies(map: &HashMap<String, String>, default: Vec<SeedStrategy>) -> Vec<SeedStrategy> {
    let Some(raw) = map.get(config_keys::SEED_STRATEGIES) else {
        return default;
    };
    let mut strategies = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match SeedStrategy::parse(name) {
            Some(s) if !strategies.contains(&s) => strategies.push(s),
            Some(_) => {}
            None => warn!(config_key = config_keys::SEED_STRATEGIES, name, "未知的种子策略，已忽略"),
        }
    }
    if strategies.is_empty() {
        warn!(config_key = config_keys::SEED_STRATEGIES, raw_value = %raw, "种子策略列表为空，使用缺省值");
        return default;
    }
    strategies
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 请求
    pub const REQUEST_TIMEOUT_MS: &str = "request_timeout_ms";

    // 求解
    pub const EXACT_CELL_LIMIT: &str = "exact_cell_limit";
    pub const SEED_STRATEGIES: &str = "seed_strategies"; // 逗号分隔
    pub const BNB_ENABLED: &str = "bnb_enabled";
    pub const BNB_BUDGET_MS: &str = "bnb_budget_ms";
    pub const BNB_POLL_INTERVAL: &str = "bnb_poll_interval";
    pub const LOCAL_SEARCH_ENABLED: &str = "local_search_enabled";
    pub const LOCAL_SEARCH_BUDGET_MS: &str = "local_search_budget_ms";
    pub const LOCAL_SEARCH_MAX_ROUNDS: &str = "local_search_max_rounds";

    // 缓存
    pub const PLAN_CACHE_CAPACITY: &str = "plan_cache_capacity";
    pub const BUFFER_POOL_IDLE: &str = "buffer_pool_idle";
    pub const CATALOG_CACHE_TTL_MS: &str = "catalog_cache_ttl_ms";

    // 补货
    pub const POOL_TARGET: &str = "pool_target";
    pub const REPLENISH_BATCH: &str = "replenish_batch";
    pub const DEFAULT_CAPACITY_HINT: &str = "default_capacity_hint";
}
