// ==========================================
// 配送计划优化系统 - 商品仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 订单的重量/价值取自商品, 修改商品等同于修改可配送集合,
//       因此写操作同样推进订单池版本号
// ==========================================

use crate::domain::product::{NewProduct, Product};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::pool_version::PoolVersion;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub struct ProductRepository<'c> {
    conn: &'c Connection,
    pool_version: &'c PoolVersion,
}

impl<'c> ProductRepository<'c> {
    pub fn new(conn: &'c Connection, pool_version: &'c PoolVersion) -> Self {
        Self { conn, pool_version }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Product> {
        Ok(Product {
            product_id: row.get(0)?,
            name: row.get(1)?,
            value: row.get(2)?,
            weight: row.get(3)?,
            image: row.get(4)?,
            description: row.get(5)?,
        })
    }

    /// 查询轻量商品（0 < weight <= max_weight），按重量、ID升序
    ///
    /// # 用途
    /// - 补货时合成可配送订单的候选来源
    pub fn find_lightweight(&self, max_weight: i64, limit: usize) -> RepositoryResult<Vec<Product>> {
        if limit == 0 || max_weight <= 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare_cached(
            r#"SELECT product_id, name, value, weight, image, description
               FROM products
               WHERE weight > 0 AND weight <= ?1 AND value >= 0
               ORDER BY weight ASC, product_id ASC
               LIMIT ?2"#,
        )?;
        let rows = stmt.query_map(params![max_weight, limit as i64], Self::map_row)?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    /// 按 product_id 查询商品
    pub fn find_by_id(&self, product_id: i64) -> RepositoryResult<Option<Product>> {
        let product = self
            .conn
            .query_row(
                r#"SELECT product_id, name, value, weight, image, description
                   FROM products WHERE product_id = ?1"#,
                params![product_id],
                Self::map_row,
            )
            .optional()?;
        Ok(product)
    }

    /// 批量写入商品（按 name upsert）
    ///
    /// # 返回
    /// - 受影响的记录数
    pub fn upsert_batch(&self, products: &[NewProduct]) -> RepositoryResult<usize> {
        if products.is_empty() {
            return Ok(0);
        }
        for p in products {
            let message = if p.name.trim().is_empty() {
                Some("名称不能为空")
            } else if p.weight <= 0 {
                Some("重量必须大于0")
            } else if p.value < 0 {
                Some("价值不能为负")
            } else {
                None
            };
            if let Some(message) = message {
                return Err(RepositoryError::InvalidProduct {
                    name: p.name.clone(),
                    message: message.to_string(),
                });
            }
        }

        let mut count = 0;
        {
            let mut stmt = self.conn.prepare_cached(
                r#"INSERT INTO products (name, value, weight, image, description)
                   VALUES (?1, ?2, ?3, ?4, ?5)
                   ON CONFLICT(name) DO UPDATE SET
                       value = excluded.value,
                       weight = excluded.weight,
                       image = excluded.image,
                       description = excluded.description"#,
            )?;
            for p in products {
                count += stmt.execute(params![p.name, p.value, p.weight, p.image, p.description])?;
            }
        }

        if count > 0 {
            self.pool_version.bump();
        }
        Ok(count)
    }

    /// 商品总数
    pub fn count(&self) -> RepositoryResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }
}
