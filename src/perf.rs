// ==========================================
// 配送计划优化系统 - 请求耗时与 SQL 统计
// ==========================================
// 职责: 每个 API 操作记录耗时、执行语句数、慢语句数
// 计数: rusqlite trace/profile 回调写线程本地计数器,
//       仅在当前线程存在存活的 PerfGuard 时累加
// 开关: 未启用时不安装回调, 连接上没有任何额外开销
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const ENV_PERF_SQL: &str = "DELIVERY_PLANNER_PERF_SQL";
const ENV_SLOW_SQL_MS: &str = "DELIVERY_PLANNER_SLOW_SQL_MS";

/// 慢语句日志中 SQL 的最大字符数
const SQL_PREVIEW_CHARS: usize = 300;

static SLOW_SQL_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static ACTIVE_GUARDS: Cell<u32> = Cell::new(0);
    static COUNTERS: Cell<SqlCounters> = Cell::new(SqlCounters::default());
}

/// 语句计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlCounters {
    pub statements: u64,
    pub slow_statements: u64,
}

impl SqlCounters {
    fn since(self, baseline: SqlCounters) -> SqlCounters {
        SqlCounters {
            statements: self.statements.saturating_sub(baseline.statements),
            slow_statements: self.slow_statements.saturating_sub(baseline.slow_statements),
        }
    }
}

fn current_counters() -> SqlCounters {
    COUNTERS.with(|c| c.get())
}

fn record(slow: bool) {
    if ACTIVE_GUARDS.with(|g| g.get()) == 0 {
        return;
    }
    COUNTERS.with(|c| {
        let mut counters = c.get();
        if slow {
            counters.slow_statements = counters.slow_statements.saturating_add(1);
        } else {
            counters.statements = counters.statements.saturating_add(1);
        }
        c.set(counters);
    });
}

// ==========================================
// SqlTraceSettings - 语句跟踪开关
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlTraceSettings {
    pub enabled: bool,
    /// 0 表示不记录慢语句
    pub slow_threshold_ms: u64,
}

impl SqlTraceSettings {
    /// 读取环境变量
    ///
    /// - `DELIVERY_PLANNER_PERF_SQL`: on/off, 未设置时调试构建开启
    /// - `DELIVERY_PLANNER_SLOW_SQL_MS`: 慢语句阈值, 未设置时调试构建 50ms, 发布构建 200ms
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup(ENV_PERF_SQL)
            .and_then(|v| parse_switch(&v))
            .unwrap_or(cfg!(debug_assertions));
        let slow_threshold_ms = lookup(ENV_SLOW_SQL_MS)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
        Self {
            enabled,
            slow_threshold_ms,
        }
    }
}

/// 开关取值; 无法识别时返回 None 交给缺省值
fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// 按环境变量为连接安装语句跟踪
pub fn install_sqlite_tracing(conn: &mut Connection) {
    install_with(conn, SqlTraceSettings::from_env());
}

pub fn install_with(conn: &mut Connection, settings: SqlTraceSettings) {
    if !settings.enabled {
        conn.trace(None);
        conn.profile(None);
        return;
    }
    SLOW_SQL_THRESHOLD_MS.store(settings.slow_threshold_ms, Ordering::Relaxed);
    conn.trace(Some(on_statement));
    conn.profile(Some(on_statement_profiled));
}

fn on_statement(_sql: &str) {
    record(false);
}

fn on_statement_profiled(sql: &str, duration: Duration) {
    let threshold = SLOW_SQL_THRESHOLD_MS.load(Ordering::Relaxed);
    let ms = duration.as_millis() as u64;
    if threshold == 0 || ms < threshold {
        return;
    }
    tracing::warn!(
        target: "slow_sql",
        duration_ms = ms,
        sql = %sql_preview(sql),
        "慢 SQL"
    );
    record(true);
}

/// 折叠空白并截断, 用于日志
fn sql_preview(sql: &str) -> String {
    let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= SQL_PREVIEW_CHARS {
        return collapsed;
    }
    let mut head: String = collapsed.chars().take(SQL_PREVIEW_CHARS).collect();
    head.push('…');
    head
}

// ==========================================
// PerfGuard - 操作计时
// ==========================================

/// 离开作用域时输出一条 `perf` 日志: 操作名, 耗时, 语句数, 慢语句数
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    baseline: SqlCounters,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        ACTIVE_GUARDS.with(|g| g.set(g.get().saturating_add(1)));
        Self {
            op,
            start: Instant::now(),
            baseline: current_counters(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// 自创建以来本线程执行的语句数
    pub fn sql_counters(&self) -> SqlCounters {
        current_counters().since(self.baseline)
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let counters = self.sql_counters();
        tracing::debug!(
            target: "perf",
            op = self.op,
            elapsed_ms = self.start.elapsed().as_millis() as u64,
            sql_count = counters.statements,
            slow_sql_count = counters.slow_statements,
            "操作结束"
        );
        ACTIVE_GUARDS.with(|g| g.set(g.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_lookup() {
        let settings = SqlTraceSettings::from_lookup(|key| match key {
            ENV_PERF_SQL => Some(" OFF ".to_string()),
            ENV_SLOW_SQL_MS => Some("75".to_string()),
            _ => None,
        });
        assert_eq!(
            settings,
            SqlTraceSettings {
                enabled: false,
                slow_threshold_ms: 75
            }
        );

        // 无法识别的开关值使用构建缺省
        let fallback = SqlTraceSettings::from_lookup(|key| match key {
            ENV_PERF_SQL => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(fallback.enabled, cfg!(debug_assertions));
    }

    #[test]
    fn test_sql_preview_collapses_whitespace() {
        assert_eq!(
            sql_preview("SELECT *\n   FROM orders\n  WHERE order_id = ?1"),
            "SELECT * FROM orders WHERE order_id = ?1"
        );
        let long = "x".repeat(SQL_PREVIEW_CHARS + 10);
        assert_eq!(sql_preview(&long).chars().count(), SQL_PREVIEW_CHARS + 1);
    }

    #[test]
    fn test_guard_counts_statements_on_traced_connection() {
        let mut conn = Connection::open_in_memory().unwrap();
        install_with(
            &mut conn,
            SqlTraceSettings {
                enabled: true,
                slow_threshold_ms: 0,
            },
        );
        conn.execute("CREATE TABLE t (x INTEGER)", []).unwrap();

        let guard = PerfGuard::new("insert_rows");
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        conn.execute("INSERT INTO t VALUES (2)", []).unwrap();
        assert_eq!(guard.sql_counters().statements, 2);
        assert_eq!(guard.sql_counters().slow_statements, 0);
        drop(guard);

        // 没有存活的计时器时不计数
        let before = current_counters();
        conn.execute("INSERT INTO t VALUES (3)", []).unwrap();
        assert_eq!(current_counters(), before);
    }

    #[test]
    fn test_nested_guards_restore_depth() {
        {
            let _outer = PerfGuard::new("outer");
            let _inner = PerfGuard::new("inner");
            assert_eq!(ACTIVE_GUARDS.with(|g| g.get()), 2);
        }
        assert_eq!(ACTIVE_GUARDS.with(|g| g.get()), 0);
    }
}
