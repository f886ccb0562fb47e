//! CSV export of a single model
//!
//! The output file holds a caption row (when captions are available), a row
//! of raw field names and one record per table row. Rows are fetched one key
//! at a time: primary keys are streamed in ascending chunks and each key is
//! followed by a query for exactly that row.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use unload_core::{
    Connection, FieldCaptions, SchemaRegistry, UnloadError, Value, model_field_captions,
};

use crate::row_query::RowQuery;

/// Errors during CSV export
#[derive(Debug, Error)]
pub enum CsvExportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error(transparent)]
    Core(#[from] UnloadError),

    #[error("{captions} captions supplied for {fields} fields")]
    CaptionMismatch { fields: usize, captions: usize },
}

/// Progress callback for export operations
pub type CsvExportProgressCallback = Box<dyn Fn(CsvExportProgress) + Send + Sync>;

/// Export progress information
#[derive(Debug, Clone)]
pub struct CsvExportProgress {
    /// Model being exported
    pub table: String,
    /// Data rows written so far
    pub rows_exported: u64,
    /// Whether this is the final report for the table
    pub finished: bool,
    pub message: String,
}

/// Settings shared by every export run
#[derive(Debug, Clone)]
pub struct CsvExportOptions {
    /// Directory receiving `unload-<table>.csv`
    pub output_dir: PathBuf,
    /// Field delimiter
    pub delimiter: u8,
    /// Number of primary keys fetched per round trip
    pub chunk_size: usize,
    /// Report progress every this many rows
    pub progress_interval: u64,
}

impl Default for CsvExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            delimiter: b';',
            chunk_size: 2000,
            progress_interval: 1000,
        }
    }
}

impl CsvExportOptions {
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

/// Default directory for export files
pub const DEFAULT_OUTPUT_DIR: &str = "/tmp/";

/// Path of the export file for `table` inside `output_dir`
pub fn output_path(output_dir: &Path, table: &str) -> PathBuf {
    output_dir.join(format!("unload-{}.csv", table))
}

/// Result of a completed export
#[derive(Debug, Clone, PartialEq)]
pub struct CsvExportSummary {
    pub path: PathBuf,
    pub rows_written: u64,
    /// Keys whose row disappeared before it could be fetched
    pub rows_skipped: u64,
}

/// Outcome of exporting a model with derived captions
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Written(CsvExportSummary),
    /// The model is not registered; nothing was written
    TableNotFound,
}

/// Writes one model's rows to a delimited file
pub struct CsvExporter {
    connection: Arc<dyn Connection>,
    registry: Arc<SchemaRegistry>,
    options: CsvExportOptions,
    progress_callback: Option<CsvExportProgressCallback>,
}

impl CsvExporter {
    /// Create a new CSV exporter
    pub fn new(
        connection: Arc<dyn Connection>,
        registry: Arc<SchemaRegistry>,
        options: CsvExportOptions,
    ) -> Self {
        Self {
            connection,
            registry,
            options,
            progress_callback: None,
        }
    }

    /// Set progress callback
    pub fn with_progress_callback(mut self, callback: CsvExportProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn options(&self) -> &CsvExportOptions {
        &self.options
    }

    fn report_progress(&self, progress: CsvExportProgress) {
        if let Some(ref callback) = self.progress_callback {
            callback(progress);
        }
    }

    /// Export every field of a model, with captions derived from the schema.
    ///
    /// An unknown model yields [`ExportOutcome::TableNotFound`].
    #[tracing::instrument(skip(self))]
    pub async fn export_table(
        &self,
        app_label: &str,
        model_name: &str,
    ) -> Result<ExportOutcome, CsvExportError> {
        let captions = match model_field_captions(&self.registry, app_label, model_name)? {
            FieldCaptions::Found(captions) => captions,
            FieldCaptions::TableNotFound => return Ok(ExportOutcome::TableNotFound),
        };
        let (fields, captions): (Vec<String>, Vec<String>) = captions.into_iter().unzip();

        let summary = self
            .export_fields(app_label, model_name, &fields, Some(&captions))
            .await?;
        Ok(ExportOutcome::Written(summary))
    }

    /// Export the given lookup paths of a model.
    ///
    /// Without captions (or with an empty list) the caption row is omitted.
    #[tracing::instrument(skip(self, fields, captions), fields(field_count = fields.len()))]
    pub async fn export_fields(
        &self,
        app_label: &str,
        model_name: &str,
        fields: &[String],
        captions: Option<&[String]>,
    ) -> Result<CsvExportSummary, CsvExportError> {
        let model = self.registry.get_model(app_label, model_name)?;
        let captions = captions.filter(|c| !c.is_empty());
        if let Some(captions) = captions
            && captions.len() != fields.len()
        {
            return Err(CsvExportError::CaptionMismatch {
                fields: fields.len(),
                captions: captions.len(),
            });
        }

        let query = RowQuery::build(&self.registry, model, fields)?;
        let table = model.model_name();
        let path = output_path(&self.options.output_dir, &table);
        tracing::info!(table = %table, path = %path.display(), "writing csv export");

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.options.delimiter)
            .quote_style(csv::QuoteStyle::Necessary)
            .terminator(csv::Terminator::CRLF)
            .from_path(&path)?;

        if let Some(captions) = captions {
            writer.write_record(captions)?;
        }
        writer.write_record(fields)?;

        let chunk_size = self.options.chunk_size.max(1);
        let row_sql = query.row_sql();
        let mut rows_written: u64 = 0;
        let mut rows_skipped: u64 = 0;
        let mut last_id: Option<Value> = None;

        loop {
            let ids = match &last_id {
                None => {
                    self.connection
                        .query(&query.first_ids_sql(chunk_size), &[])
                        .await?
                }
                Some(id) => {
                    self.connection
                        .query(&query.next_ids_sql(chunk_size), std::slice::from_ref(id))
                        .await?
                }
            };
            let fetched = ids.row_count();

            for id_row in ids.rows {
                let id = id_row.into_values().into_iter().next().unwrap_or(Value::Null);
                match self
                    .connection
                    .query_first(&row_sql, std::slice::from_ref(&id))
                    .await?
                {
                    Some(row) => {
                        writer.write_record(row.values.iter().map(format_value))?;
                        rows_written += 1;
                        if rows_written % self.options.progress_interval.max(1) == 0 {
                            self.report_progress(CsvExportProgress {
                                table: table.clone(),
                                rows_exported: rows_written,
                                finished: false,
                                message: format!("Exported {} rows from {}", rows_written, table),
                            });
                        }
                    }
                    None => {
                        tracing::warn!(table = %table, id = %id, "row vanished during export, skipping");
                        rows_skipped += 1;
                    }
                }
                last_id = Some(id);
            }

            if fetched < chunk_size {
                break;
            }
        }

        writer.flush()?;

        self.report_progress(CsvExportProgress {
            table: table.clone(),
            rows_exported: rows_written,
            finished: true,
            message: format!("Exported {} rows to {}", rows_written, path.display()),
        });
        tracing::info!(
            table = %table,
            rows_written,
            rows_skipped,
            "csv export finished"
        );

        Ok(CsvExportSummary {
            path,
            rows_written,
            rows_skipped,
        })
    }
}

/// Text form of a value inside a CSV field
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bytes(bytes) => hex::encode(bytes),
        other => other.to_string(),
    }
}
