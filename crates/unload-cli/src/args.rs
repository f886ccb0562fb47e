//! Command line arguments

use clap::Parser;
use std::path::PathBuf;

/// Export table data to csv file
#[derive(Debug, Parser)]
#[command(name = "unload", version, about = "Export table data to csv file")]
pub struct Cli {
    /// Model to export [default: user]
    #[arg(long)]
    pub table: Option<String>,

    /// Application label of the model [default: auth]
    #[arg(long)]
    pub app: Option<String>,

    /// SQLite database file
    #[arg(long, env = "UNLOAD_DATABASE")]
    pub database: Option<PathBuf>,

    /// Schema registry (TOML); the built-in auth schema is used when omitted
    #[arg(long, env = "UNLOAD_SCHEMA")]
    pub schema: Option<PathBuf>,

    /// Directory receiving unload-<table>.csv [default: /tmp/]
    #[arg(long, env = "UNLOAD_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Comma-separated lookup paths to export instead of every field
    #[arg(long, value_delimiter = ',')]
    pub fields: Option<Vec<String>>,

    /// Comma-separated captions for --fields
    #[arg(long, value_delimiter = ',', requires = "fields")]
    pub captions: Option<Vec<String>>,

    /// Config file [default: <config dir>/unload/config.toml]
    #[arg(long, env = "UNLOAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write JSON logs to this directory
    #[arg(long, env = "UNLOAD_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
