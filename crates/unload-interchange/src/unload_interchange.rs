//! Table export for unload
//!
//! ```text
//! SchemaRegistry ──► captions (lookup paths) ──┐
//!                                              ├──► CsvExporter ──► unload-<table>.csv
//! Connection ──► key chunks ──► one row per key┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let exporter = CsvExporter::new(connection, Arc::new(registry), CsvExportOptions::default());
//! match exporter.export_table("auth", "user").await? {
//!     ExportOutcome::Written(summary) => println!("{}", summary.path.display()),
//!     ExportOutcome::TableNotFound => println!("{}", TABLE_NOT_FOUND),
//! }
//! ```

mod csv_export;
pub mod row_query;

pub use csv_export::{
    CsvExportError, CsvExportOptions, CsvExportProgress, CsvExportProgressCallback,
    CsvExportSummary, CsvExporter, DEFAULT_OUTPUT_DIR, ExportOutcome, format_value, output_path,
};
pub use row_query::RowQuery;
