// ==========================================
// 配送计划优化系统 - 导入层
// ==========================================
// 职责: 外部数据导入（商品目录）
// 支持: CSV
// ==========================================

pub mod catalog_importer;
pub mod error;
pub mod file_parser;

// 重导出核心类型
pub use catalog_importer::{CatalogImportResult, CatalogImporter, RejectedRow};
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, FileParser, RawRecord};
