// ==========================================
// 配送计划优化系统 - 商品目录导入器
// ==========================================
// 流程: 解析 → 行级校验 → 单事务 upsert → 失效轻量商品缓存
// 列: name, weight, value [, image, description]
// 红线: 非法行只拒绝该行并记录原因, 不中止整批导入
// ==========================================

use crate::domain::product::NewProduct;
use crate::engine::pool_state::PoolState;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{CsvParser, FileParser, RawRecord};
use crate::repository::Store;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const REQUIRED_COLUMNS: [&str; 3] = ["name", "weight", "value"];

/// 被拒绝的行
#[derive(Debug, Clone, Serialize)]
pub struct RejectedRow {
    pub line: usize,
    pub reason: String,
}

/// 导入结果
#[derive(Debug, Clone, Serialize)]
pub struct CatalogImportResult {
    pub batch_id: String,
    pub total_rows: usize,
    pub imported: usize,
    pub rejected: Vec<RejectedRow>,
    pub elapsed_ms: u64,
}

// ==========================================
// CatalogImporter
// ==========================================
pub struct CatalogImporter {
    store: Store,
    pool_state: Arc<PoolState>,
    file_parser: Box<dyn FileParser + Send + Sync>,
}

impl CatalogImporter {
    pub fn new(store: Store, pool_state: Arc<PoolState>) -> Self {
        Self {
            store,
            pool_state,
            file_parser: Box::new(CsvParser),
        }
    }

    /// 从 CSV 文件导入商品目录
    ///
    /// # 参数
    /// - file_path: CSV 文件路径（首行为表头）
    ///
    /// # 返回
    /// - Ok(CatalogImportResult): 导入结果（含被拒绝的行）
    /// - Err: 文件级错误或数据库错误
    #[instrument(skip(self, file_path), fields(batch_id))]
    pub fn import_from_csv<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<CatalogImportResult> {
        let start = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());

        let (headers, records) = self.file_parser.parse_to_raw_records(file_path.as_ref())?;
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(ImportError::MissingColumn(column.to_string()));
            }
        }

        let mut valid = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();
        for record in &records {
            match map_record(record) {
                Ok(product) => valid.push(product),
                Err(e) => {
                    warn!(line = record.line, error = %e, "拒绝商品行");
                    rejected.push(RejectedRow {
                        line: record.line,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let imported = self
            .store
            .exec_tx(|tx| -> ImportResult<usize> { Ok(tx.products().upsert_batch(&valid)?) })?;

        // 商品重量/价值可能变化, 缓存的轻量商品不再可信
        if imported > 0 {
            self.pool_state.catalog().invalidate();
        }

        let result = CatalogImportResult {
            batch_id,
            total_rows: records.len(),
            imported,
            rejected,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            batch_id = %result.batch_id,
            total = result.total_rows,
            imported = result.imported,
            rejected = result.rejected.len(),
            "商品目录导入完成"
        );
        Ok(result)
    }
}

/// 行 → 待导入商品
fn map_record(record: &RawRecord) -> ImportResult<NewProduct> {
    let line = record.line;
    let name = record.get("name").ok_or_else(|| ImportError::FieldMissing {
        row: line,
        field: "name".to_string(),
    })?;
    let weight = parse_int(record, "weight")?;
    let value = parse_int(record, "value")?;

    if weight <= 0 {
        return Err(ImportError::ValueRangeError {
            row: line,
            field: "weight".to_string(),
            value: weight,
            rule: "> 0".to_string(),
        });
    }
    if value < 0 {
        return Err(ImportError::ValueRangeError {
            row: line,
            field: "value".to_string(),
            value,
            rule: ">= 0".to_string(),
        });
    }

    Ok(NewProduct {
        name: name.to_string(),
        value,
        weight,
        image: record.get("image").map(str::to_string),
        description: record.get("description").map(str::to_string),
    })
}

fn parse_int(record: &RawRecord, field: &str) -> ImportResult<i64> {
    let raw = record.get(field).ok_or_else(|| ImportError::FieldMissing {
        row: record.line,
        field: field.to_string(),
    })?;
    raw.parse::<i64>()
        .map_err(|e| ImportError::TypeConversionError {
            row: record.line,
            field: field.to_string(),
            message: format!("{} ({})", e, raw),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::pool_state::PoolStateOptions;
    use crate::domain::product::Product;
    use std::io::Write;
    use tempfile::Builder;

    fn importer() -> (CatalogImporter, Store, Arc<PoolState>) {
        let pool_state = Arc::new(PoolState::new(PoolStateOptions::default()));
        let store = Store::open_in_memory(pool_state.version().clone()).unwrap();
        (
            CatalogImporter::new(store.clone(), pool_state.clone()),
            store,
            pool_state,
        )
    }

    fn write_csv(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_import_valid_rows_and_report_rejected() {
        let (importer, store, _) = importer();
        let file = write_csv(&[
            "name,weight,value,image,description",
            "apple,3,40,apple.png,红富士",
            "ghost,0,10,,",
            "stone,5,-1,,",
            ",2,5,,",
            "pear,abc,5,,",
            "melon,8,70",
        ]);

        let result = importer.import_from_csv(file.path()).unwrap();
        assert_eq!(result.total_rows, 6);
        assert_eq!(result.imported, 2);
        let lines: Vec<usize> = result.rejected.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![3, 4, 5, 6]);

        let products: Vec<Product> = store
            .exec_tx(|tx| tx.products().find_lightweight(100, 10))
            .unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "apple");
        assert_eq!(products[0].image.as_deref(), Some("apple.png"));
        assert_eq!(products[1].description, None);
    }

    #[test]
    fn test_reimport_updates_existing_product() {
        let (importer, store, pool_state) = importer();
        importer
            .import_from_csv(write_csv(&["name,weight,value", "apple,3,40"]).path())
            .unwrap();
        let version = pool_state.current_version();

        pool_state.catalog().store(100, &[]);
        importer
            .import_from_csv(write_csv(&["name,weight,value", "apple,4,45"]).path())
            .unwrap();

        assert!(pool_state.current_version() > version);
        assert!(pool_state.catalog().get(100, 0).is_none());
        let count = store.exec_tx(|tx| tx.products().count()).unwrap();
        assert_eq!(count, 1);
        let products = store
            .exec_tx(|tx| tx.products().find_lightweight(100, 10))
            .unwrap();
        assert_eq!((products[0].weight, products[0].value), (4, 45));
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let (importer, _, _) = importer();
        let result = importer.import_from_csv(write_csv(&["name,value", "apple,40"]).path());
        assert!(matches!(result, Err(ImportError::MissingColumn(c)) if c == "weight"));
    }
}
