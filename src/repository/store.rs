// ==========================================
// 配送计划优化系统 - 事务存储
// ==========================================
// 职责: 持有共享连接与订单池版本号, 以事务为单位对外提供仓储
// 红线: 订单仓储/商品仓储只能在 exec_tx 的闭包内获得
// ==========================================

use crate::db::{configure_sqlite_connection, ensure_schema, open_sqlite_connection};
use crate::perf::install_sqlite_tracing;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::order_repo::OrderRepository;
use crate::repository::product_repo::ProductRepository;
use crate::repository::pool_version::PoolVersion;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

// ==========================================
// Store - 事务存储
// ==========================================
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    pool_version: Arc<PoolVersion>,
}

impl Store {
    /// 由已有连接创建（调用方负责建表）
    pub fn new(conn: Arc<Mutex<Connection>>, pool_version: Arc<PoolVersion>) -> Self {
        Self { conn, pool_version }
    }

    /// 打开数据库文件, 应用统一 PRAGMA 并建表
    pub fn open(db_path: &str, pool_version: Arc<PoolVersion>) -> RepositoryResult<Self> {
        let mut conn = open_sqlite_connection(db_path)?;
        install_sqlite_tracing(&mut conn);
        ensure_schema(&conn)?;
        Ok(Self::new(Arc::new(Mutex::new(conn)), pool_version))
    }

    /// 内存数据库（测试与演示用）
    pub fn open_in_memory(pool_version: Arc<PoolVersion>) -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory()?;
        configure_sqlite_connection(&conn)?;
        ensure_schema(&conn)?;
        Ok(Self::new(Arc::new(Mutex::new(conn)), pool_version))
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn pool_version(&self) -> &Arc<PoolVersion> {
        &self.pool_version
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    /// 在单个事务内执行闭包
    ///
    /// # 说明
    /// - 闭包返回 Ok 时提交, 返回 Err 时回滚
    /// - 使用 IMMEDIATE 事务, 进入闭包前即持有写锁
    /// - 同一时刻至多一个事务在执行, 计划生成与状态转换因此串行化
    pub fn exec_tx<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&TxStore<'_>) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut guard = self.get_conn()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let result = {
            let store = TxStore {
                conn: &*tx,
                pool_version: &self.pool_version,
            };
            f(&store)
        };

        match result {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = tx.rollback() {
                    warn!(error = %e, "事务回滚失败");
                }
                debug!("事务已回滚");
                Err(err)
            }
        }
    }
}

// ==========================================
// TxStore - 事务内视图
// ==========================================
pub struct TxStore<'t> {
    conn: &'t Connection,
    pool_version: &'t PoolVersion,
}

impl<'t> TxStore<'t> {
    pub fn orders(&self) -> OrderRepository<'_> {
        OrderRepository::new(self.conn, self.pool_version)
    }

    pub fn products(&self) -> ProductRepository<'_> {
        ProductRepository::new(self.conn, self.pool_version)
    }

    pub fn pool_version(&self) -> u64 {
        self.pool_version.current()
    }

    pub fn connection(&self) -> &Connection {
        self.conn
    }

    /// 在保存点内执行闭包
    ///
    /// 闭包失败时只回滚到保存点, 外层事务继续有效
    pub fn savepoint<T, E, F>(&self, name: &'static str, f: F) -> Result<T, E>
    where
        F: FnOnce(&TxStore<'_>) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        self.conn
            .execute_batch(&format!("SAVEPOINT {}", name))
            .map_err(RepositoryError::from)?;

        match f(self) {
            Ok(value) => {
                self.conn
                    .execute_batch(&format!("RELEASE {}", name))
                    .map_err(RepositoryError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = self
                    .conn
                    .execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0}", name))
                {
                    warn!(savepoint = name, error = %e, "保存点回滚失败");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::NewOrder;
    use crate::domain::product::NewProduct;
    use crate::domain::types::ShipmentStatus;

    fn memory_store() -> Store {
        Store::open_in_memory(Arc::new(PoolVersion::new())).unwrap()
    }

    fn seed_product(store: &Store, name: &str, weight: i64, value: i64) -> i64 {
        store
            .exec_tx(|tx| -> RepositoryResult<i64> {
                tx.products().upsert_batch(&[NewProduct {
                    name: name.to_string(),
                    value,
                    weight,
                    image: None,
                    description: None,
                }])?;
                let id = tx
                    .connection()
                    .query_row("SELECT product_id FROM products WHERE name = ?1", [name], |r| {
                        r.get(0)
                    })?;
                Ok(id)
            })
            .unwrap()
    }

    #[test]
    fn test_commit_and_version_bump() {
        let store = memory_store();
        let pid = seed_product(&store, "A", 5, 10);
        let before = store.pool_version().current();

        let ids = store
            .exec_tx(|tx| tx.orders().batch_create(&[NewOrder { user_id: 1, product_id: pid }]))
            .unwrap();
        assert_eq!(ids.len(), 1);
        assert!(store.pool_version().current() > before);

        let listed = store.exec_tx(|tx| tx.orders().list_shipping()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].weight, 5);
        assert_eq!(listed[0].value, 10);
        assert_eq!(listed[0].status, ShipmentStatus::Eligible);
    }

    #[test]
    fn test_error_rolls_back_whole_transaction() {
        let store = memory_store();
        let pid = seed_product(&store, "A", 5, 10);

        let result: RepositoryResult<()> = store.exec_tx(|tx| {
            tx.orders().batch_create(&[NewOrder { user_id: 1, product_id: pid }])?;
            Err(RepositoryError::Other(anyhow::anyhow!("boom")))
        });
        assert!(result.is_err());

        let count = store
            .exec_tx(|tx| tx.orders().count_by_status(ShipmentStatus::Eligible))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_partial_transition_is_rejected() {
        let store = memory_store();
        let pid = seed_product(&store, "A", 5, 10);
        let ids = store
            .exec_tx(|tx| {
                tx.orders().batch_create(&[
                    NewOrder { user_id: 1, product_id: pid },
                    NewOrder { user_id: 2, product_id: pid },
                ])
            })
            .unwrap();

        // 第二个ID不存在, 整体失败且第一条不被修改
        let result = store.exec_tx(|tx| {
            tx.orders().transition_statuses(
                &[ids[0], 9999],
                ShipmentStatus::Eligible,
                ShipmentStatus::InTransit,
            )
        });
        assert!(matches!(
            result,
            Err(RepositoryError::InvalidStateTransition { expected: 2, actual: 1, .. })
        ));

        let first = store.exec_tx(|tx| tx.orders().find_by_id(ids[0])).unwrap().unwrap();
        assert_eq!(first.status, ShipmentStatus::Eligible);
    }

    #[test]
    fn test_savepoint_failure_keeps_outer_work() {
        let store = memory_store();
        let pid = seed_product(&store, "A", 5, 10);

        store
            .exec_tx(|tx| -> RepositoryResult<()> {
                tx.orders().batch_create(&[NewOrder { user_id: 1, product_id: pid }])?;
                let inner: RepositoryResult<()> = tx.savepoint("inner", |sp| {
                    sp.orders().batch_create(&[NewOrder { user_id: 2, product_id: pid }])?;
                    Err(RepositoryError::Other(anyhow::anyhow!("inner failed")))
                });
                assert!(inner.is_err());
                Ok(())
            })
            .unwrap();

        let count = store
            .exec_tx(|tx| tx.orders().count_by_status(ShipmentStatus::Eligible))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_find_lightweight_orders_by_weight() {
        let store = memory_store();
        seed_product(&store, "heavy", 500, 1);
        seed_product(&store, "b", 3, 1);
        seed_product(&store, "a", 2, 1);
        // 绕过仓储校验写入零重量商品
        store
            .exec_tx(|tx| -> RepositoryResult<usize> {
                Ok(tx.connection().execute(
                    "INSERT INTO products (name, value, weight) VALUES ('zero', 1, 0)",
                    [],
                )?)
            })
            .unwrap();

        let light = store
            .exec_tx(|tx| tx.products().find_lightweight(100, 10))
            .unwrap();
        let names: Vec<_> = light.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_product_rejected_without_version_bump() {
        let store = memory_store();
        let before = store.pool_version().current();

        let result = store.exec_tx(|tx| {
            tx.products().upsert_batch(&[NewProduct {
                name: "feather".to_string(),
                value: 3,
                weight: 0,
                image: None,
                description: None,
            }])
        });

        assert!(matches!(result, Err(RepositoryError::InvalidProduct { .. })));
        assert_eq!(store.pool_version().current(), before);
    }
}
