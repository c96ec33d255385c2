// ==========================================
// 配送计划优化系统 - 订单仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 可配送集合的每次变更都必须推进订单池版本号
// ==========================================

use crate::domain::order::{NewOrder, Order};
use crate::domain::types::ShipmentStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::pool_version::PoolVersion;
use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

// ==========================================
// ShipmentStatus <-> SQLite 转换
// ==========================================
impl ToSql for ShipmentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_db_str()))
    }
}

impl FromSql for ShipmentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        ShipmentStatus::from_db_str(s).ok_or_else(|| {
            FromSqlError::Other(format!("未知的 shipped_status: {}", s).into())
        })
    }
}

// ==========================================
// OrderRepository - 订单仓储
// ==========================================
// 仅能通过 TxStore 获得, 所有操作都运行在调用方的事务内
pub struct OrderRepository<'c> {
    conn: &'c Connection,
    pool_version: &'c PoolVersion,
}

const ORDER_COLUMNS: &str = r#"
    o.order_id, o.user_id, o.product_id, p.weight, p.value,
    o.shipped_status, o.created_at, o.arrived_at
"#;

impl<'c> OrderRepository<'c> {
    pub fn new(conn: &'c Connection, pool_version: &'c PoolVersion) -> Self {
        Self { conn, pool_version }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Order> {
        Ok(Order {
            order_id: row.get(0)?,
            user_id: row.get(1)?,
            product_id: row.get(2)?,
            weight: row.get(3)?,
            value: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
            arrived_at: row.get(7)?,
        })
    }

    /// 查询全部可配送订单（重量/价值取自商品），按 order_id 升序
    pub fn list_shipping(&self) -> RepositoryResult<Vec<Order>> {
        let sql = format!(
            r#"SELECT {}
               FROM orders o
               JOIN products p ON o.product_id = p.product_id
               WHERE o.shipped_status = ?1
               ORDER BY o.order_id ASC"#,
            ORDER_COLUMNS
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![ShipmentStatus::Eligible], Self::map_row)?;

        let mut orders = Vec::new();
        for row in rows {
            orders.push(row?);
        }
        Ok(orders)
    }

    /// 统计指定状态的订单数量
    pub fn count_by_status(&self, status: ShipmentStatus) -> RepositoryResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM orders WHERE shipped_status = ?1",
            params![status],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }

    /// 按 order_id 查询订单
    pub fn find_by_id(&self, order_id: i64) -> RepositoryResult<Option<Order>> {
        let sql = format!(
            r#"SELECT {}
               FROM orders o
               JOIN products p ON o.product_id = p.product_id
               WHERE o.order_id = ?1"#,
            ORDER_COLUMNS
        );
        let order = self
            .conn
            .query_row(&sql, params![order_id], Self::map_row)
            .optional()?;
        Ok(order)
    }

    /// 批量写入新订单（状态固定为可配送）
    ///
    /// # 返回
    /// - 新订单ID列表，与入参顺序一致
    pub fn batch_create(&self, orders: &[NewOrder]) -> RepositoryResult<Vec<i64>> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut inserted = Vec::with_capacity(orders.len());
        {
            let mut stmt = self.conn.prepare_cached(
                r#"INSERT INTO orders (user_id, product_id, shipped_status, created_at)
                   VALUES (?1, ?2, ?3, ?4)"#,
            )?;
            for order in orders {
                stmt.execute(params![
                    order.user_id,
                    order.product_id,
                    ShipmentStatus::Eligible,
                    now
                ])?;
                inserted.push(self.conn.last_insert_rowid());
            }
        }

        self.pool_version.bump();
        Ok(inserted)
    }

    /// 批量状态转换（全部成功或返回错误）
    ///
    /// # 说明
    /// - 仅更新当前状态为 `from` 的订单
    /// - 实际更新条数 != 去重后的ID数 时返回 InvalidStateTransition，
    ///   调用方事务回滚后不会留下部分转换
    /// - 转换为已送达时记录 arrived_at
    pub fn transition_statuses(
        &self,
        order_ids: &[i64],
        from: ShipmentStatus,
        to: ShipmentStatus,
    ) -> RepositoryResult<usize> {
        if !from.can_transition_to(to) {
            return Err(RepositoryError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
                expected: order_ids.len(),
                actual: 0,
            });
        }

        let unique_ids: BTreeSet<i64> = order_ids.iter().copied().collect();
        if unique_ids.is_empty() {
            return Ok(0);
        }

        let arrived_at = if to == ShipmentStatus::Delivered {
            Some(Utc::now())
        } else {
            None
        };

        let mut updated = 0usize;
        {
            let mut stmt = self.conn.prepare_cached(
                r#"UPDATE orders
                   SET shipped_status = ?1,
                       arrived_at = COALESCE(?2, arrived_at)
                   WHERE order_id = ?3 AND shipped_status = ?4"#,
            )?;
            for order_id in &unique_ids {
                updated += stmt.execute(params![to, arrived_at, order_id, from])?;
            }
        }

        if updated != unique_ids.len() {
            return Err(RepositoryError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
                expected: unique_ids.len(),
                actual: updated,
            });
        }

        self.pool_version.bump();
        Ok(updated)
    }
}
