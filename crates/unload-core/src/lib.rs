//! unload core - shared abstractions for the table export tool
//!
//! This crate defines:
//!
//! - `Connection` - async trait implemented by database drivers
//! - `SchemaRegistry` - statically declared models, fields and relations
//! - `verbose_name` / `model_field_captions` - caption resolution for lookup paths
//! - Common types like `Value`, `Row`, `QueryResult` and `UnloadError`

mod builtin;
mod connection;
mod error;
pub mod lookup;
mod registry;
mod types;

pub use builtin::{DEFAULT_APP_LABEL, DEFAULT_MODEL};
pub use connection::*;
pub use error::*;
pub use lookup::{
    CAPTION_SEP, FieldCaptions, LOOKUP_SEP, TABLE_NOT_FOUND, model_field_captions,
    resolve_segment, verbose_name,
};
pub use registry::*;
pub use types::*;
