//! Built-in schema for the stock `auth` and `contenttypes` tables

use crate::{Result, SchemaRegistry};

/// Default application label
pub const DEFAULT_APP_LABEL: &str = "auth";

/// Default model exported when none is named
pub const DEFAULT_MODEL: &str = "user";

const BUILTIN_SCHEMA: &str = include_str!("builtin_schema.toml");

impl SchemaRegistry {
    /// Registry describing the stock authentication tables
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_SCHEMA)
    }
}
