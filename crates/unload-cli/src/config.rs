//! Config file loading and settings resolution
//!
//! Precedence: command line (or environment) > config file > built-in default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use unload_core::{DEFAULT_APP_LABEL, DEFAULT_MODEL, UnloadError};
use unload_interchange::DEFAULT_OUTPUT_DIR;

use crate::args::Cli;

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .context("Could not determine config directory")
        .map(|p| p.join("unload"))
}

pub fn default_config_file() -> Result<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}

/// Optional settings read from `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub database: Option<PathBuf>,
    pub schema: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub app: Option<String>,
    pub table: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub log_filter: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&source).with_context(|| format!("Invalid config file: {:?}", path))
    }

    /// Load the explicitly named file, or the default file when it exists
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_file() {
            Ok(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Fully resolved settings for one export run
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub database: PathBuf,
    pub schema: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub app_label: String,
    pub table: String,
    pub fields: Option<Vec<String>>,
    pub captions: Option<Vec<String>>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ExportSettings {
    pub fn resolve(cli: &Cli, file: &FileConfig) -> Result<Self> {
        let table = non_blank(&cli.table)
            .or_else(|| file.table.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if table.trim().is_empty() {
            return Err(UnloadError::Configuration("--table is required".into()).into());
        }

        let app_label = non_blank(&cli.app)
            .or_else(|| non_blank(&file.app))
            .unwrap_or_else(|| DEFAULT_APP_LABEL.to_string());

        let database = cli
            .database
            .clone()
            .or_else(|| file.database.clone())
            .ok_or_else(|| {
                UnloadError::Configuration(
                    "--database is required (or set UNLOAD_DATABASE / `database` in the config file)"
                        .into(),
                )
            })?;

        Ok(Self {
            database,
            schema: cli.schema.clone().or_else(|| file.schema.clone()),
            output_dir: cli
                .output_dir
                .clone()
                .or_else(|| file.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            app_label,
            table: table.trim().to_string(),
            fields: cli.fields.clone(),
            captions: cli.captions.clone(),
        })
    }
}
