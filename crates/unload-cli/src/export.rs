//! One export run: registry, connection, exporter

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use unload_core::{Connection, SchemaRegistry, TABLE_NOT_FOUND};
use unload_driver_sqlite::SqliteConnection;
use unload_interchange::{CsvExportOptions, CsvExportProgress, CsvExporter, ExportOutcome};

use crate::config::ExportSettings;

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Written { path: PathBuf, rows: u64 },
    TableNotFound,
}

fn load_registry(settings: &ExportSettings) -> Result<SchemaRegistry> {
    match settings.schema {
        Some(ref path) => SchemaRegistry::from_file(path)
            .with_context(|| format!("Failed to load schema: {:?}", path)),
        None => SchemaRegistry::builtin().context("Failed to load built-in schema"),
    }
}

pub async fn run_export(settings: &ExportSettings) -> Result<RunOutcome> {
    let registry = Arc::new(load_registry(settings)?);
    let database = settings.database.to_string_lossy();
    let connection = Arc::new(
        SqliteConnection::open_read_only(&database)
            .with_context(|| format!("Failed to open database: {}", database))?,
    );

    let exporter = CsvExporter::new(
        connection.clone(),
        registry,
        CsvExportOptions::default().with_output_dir(&settings.output_dir),
    )
    .with_progress_callback(Box::new(|progress: CsvExportProgress| {
        tracing::info!(table = %progress.table, rows = progress.rows_exported, "{}", progress.message);
    }));

    tracing::info!("Unload table {} started", settings.table);

    let result = match settings.fields {
        Some(ref fields) => exporter
            .export_fields(
                &settings.app_label,
                &settings.table,
                fields,
                settings.captions.as_deref(),
            )
            .await
            .map(ExportOutcome::Written),
        None => {
            exporter
                .export_table(&settings.app_label, &settings.table)
                .await
        }
    };

    if let Err(e) = connection.close().await {
        tracing::warn!(error = %e, "Failed to close database connection");
    }

    match result.with_context(|| format!("Export of table {} failed", settings.table))? {
        ExportOutcome::Written(summary) => {
            let message = format!(
                "Export table {} to csv complete. Created file: {}",
                settings.table,
                summary.path.display()
            );
            tracing::info!("{}", message);
            println!("{}", message);
            Ok(RunOutcome::Written {
                path: summary.path,
                rows: summary.rows_written,
            })
        }
        ExportOutcome::TableNotFound => {
            tracing::warn!(app = %settings.app_label, table = %settings.table, "{}", TABLE_NOT_FOUND);
            println!("{}", TABLE_NOT_FOUND);
            Ok(RunOutcome::TableNotFound)
        }
    }
}
