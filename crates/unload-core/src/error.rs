//! Error types for unload

use thiserror::Error;

/// Core error type for unload operations
#[derive(Error, Debug)]
pub enum UnloadError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Model not found: {app_label}.{model}")]
    ModelNotFound { app_label: String, model: String },

    #[error("Invalid lookup string '{lookup}' on model '{model}'")]
    InvalidLookup { model: String, lookup: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema file error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl UnloadError {
    pub fn model_not_found(app_label: &str, model: &str) -> Self {
        UnloadError::ModelNotFound {
            app_label: app_label.to_string(),
            model: model.to_string(),
        }
    }

    pub fn invalid_lookup(model: &str, lookup: &str) -> Self {
        UnloadError::InvalidLookup {
            model: model.to_string(),
            lookup: lookup.to_string(),
        }
    }
}

/// Result type alias for unload operations
pub type Result<T> = std::result::Result<T, UnloadError>;
