//! Caption resolution for field lookup paths
//!
//! A lookup path such as `groups__permissions__name` walks relations from
//! model to model. Each segment contributes one caption; the captions are
//! joined with [`CAPTION_SEP`].

use indexmap::IndexMap;

use crate::{ModelSchema, ResolvedField, Result, SchemaRegistry, UnloadError};

/// Separator between segments of a lookup path
pub const LOOKUP_SEP: &str = "__";

/// Separator between captions of consecutive segments
pub const CAPTION_SEP: &str = " - ";

/// Text reported when a model cannot be found while listing its fields
pub const TABLE_NOT_FOUND: &str = "Table not found";

/// Resolve a lookup path on `app_label.model_name` to a human-readable caption.
///
/// Relation segments contribute the relation's own caption, or the related
/// model's caption when the relation has none (reverse relations). The first
/// non-relation segment ends the walk.
pub fn verbose_name(
    registry: &SchemaRegistry,
    app_label: &str,
    model_name: &str,
    lookup: &str,
) -> Result<String> {
    let mut model = registry.get_model(app_label, model_name)?;
    let segments: Vec<&str> = lookup.split(LOOKUP_SEP).collect();
    let mut captions = Vec::with_capacity(segments.len());

    for (idx, part) in segments.iter().enumerate() {
        let field = resolve_segment(registry, model, part)
            .ok_or_else(|| UnloadError::invalid_lookup(&model.key().to_string(), lookup))?;

        if field.is_relation() {
            let related = field
                .related_model(registry)?
                .ok_or_else(|| UnloadError::invalid_lookup(&model.key().to_string(), lookup))?;
            let caption = field.own_caption().unwrap_or_else(|| related.caption());
            captions.push(caption);
            model = related;
        } else {
            captions.push(field.caption_or_name());
            let rest = &segments[idx + 1..];
            if !rest.is_empty() {
                tracing::debug!(
                    lookup = %lookup,
                    ignored = %rest.join(LOOKUP_SEP),
                    "lookup continues past a non-relation field"
                );
            }
            break;
        }
    }

    Ok(captions.join(CAPTION_SEP))
}

/// Find `part` on `model`: declared fields and reverse query names first,
/// then reverse accessor names.
pub fn resolve_segment<'a>(
    registry: &'a SchemaRegistry,
    model: &'a ModelSchema,
    part: &str,
) -> Option<ResolvedField<'a>> {
    registry.resolve_field(model, part).or_else(|| {
        registry
            .resolve_accessor(model, part)
            .map(ResolvedField::Reverse)
    })
}

impl ResolvedField<'_> {
    fn caption_or_name(&self) -> String {
        self.own_caption().unwrap_or_else(|| self.name().replace('_', " "))
    }
}

/// Field names of a model mapped to their captions
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCaptions {
    /// Field name to caption, in field enumeration order
    Found(IndexMap<String, String>),
    /// The model is not registered
    TableNotFound,
}

impl std::fmt::Display for FieldCaptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldCaptions::Found(captions) => {
                let rendered: Vec<String> = captions
                    .iter()
                    .map(|(name, caption)| format!("{}: {}", name, caption))
                    .collect();
                write!(f, "{}", rendered.join(", "))
            }
            FieldCaptions::TableNotFound => write!(f, "{}", TABLE_NOT_FOUND),
        }
    }
}

/// Caption of every field of `app_label.model_name`.
///
/// An unknown model is reported as [`FieldCaptions::TableNotFound`] rather
/// than as an error.
pub fn model_field_captions(
    registry: &SchemaRegistry,
    app_label: &str,
    model_name: &str,
) -> Result<FieldCaptions> {
    let model = match registry.get_model(app_label, model_name) {
        Ok(model) => model,
        Err(UnloadError::ModelNotFound { .. }) => {
            tracing::warn!(app = %app_label, model = %model_name, "table not found");
            return Ok(FieldCaptions::TableNotFound);
        }
        Err(e) => return Err(e),
    };

    let mut captions = IndexMap::new();
    for field in registry.fields(model) {
        let name = field.name();
        let caption = verbose_name(registry, app_label, model_name, &name)?;
        captions.insert(name, caption);
    }
    Ok(FieldCaptions::Found(captions))
}
