//! Statically declared schema registry
//!
//! Models are grouped by application label and carry an ordered list of
//! fields. Relations are declared on one side only; the registry derives the
//! reverse side so lookups can walk a relation from either end.
//!
//! A registry is built in code with the `with_*` builders or loaded from TOML:
//!
//! ```toml
//! [[apps]]
//! label = "shop"
//!
//! [[apps.models]]
//! name = "Order"
//! fields = [
//!   { name = "id", verbose_name = "ID" },
//!   { name = "customer", relation = { kind = "foreign_key", to = "shop.customer" } },
//! ]
//! ```

use convert_case::{Case, Casing};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::{Result, UnloadError};

/// Kind of a declared relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    ForeignKey,
    OneToOne,
    ManyToMany,
}

impl RelationKind {
    /// Whether the declaring side points at a single row
    pub fn is_to_one(self) -> bool {
        matches!(self, RelationKind::ForeignKey | RelationKind::OneToOne)
    }
}

/// A relation declared on a field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Relation {
    pub kind: RelationKind,
    /// Target model, `"app.model"` or `"model"` for the declaring app
    pub to: String,
    /// Name of the reverse accessor on the target model; a trailing `+` hides it
    #[serde(default)]
    pub related_name: Option<String>,
    /// Name of the reverse relation in lookup paths
    #[serde(default)]
    pub related_query_name: Option<String>,
    /// Join table for many-to-many relations
    #[serde(default)]
    pub through: Option<String>,
    /// Whether a many-to-many relation to its own model works both ways.
    /// Defaults to true for such relations.
    #[serde(default)]
    pub symmetrical: Option<bool>,
}

impl Relation {
    pub fn new(kind: RelationKind, to: impl Into<String>) -> Self {
        Self {
            kind,
            to: to.into(),
            related_name: None,
            related_query_name: None,
            through: None,
            symmetrical: None,
        }
    }

    /// Hidden relations have no reverse side
    pub fn is_hidden(&self) -> bool {
        self.related_name
            .as_deref()
            .is_some_and(|name| name.ends_with('+'))
    }

    /// A symmetrical many-to-many from `source` to itself; it has no reverse side
    pub fn is_symmetrical(&self, source: &ModelSchema) -> bool {
        self.kind == RelationKind::ManyToMany
            && self.symmetrical.unwrap_or(true)
            && ModelKey::parse(&source.app_label, &self.to) == source.key()
    }
}

/// A field of a model
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub name: String,
    #[serde(default)]
    pub verbose_name: Option<String>,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub relation: Option<Relation>,
}

impl FieldDef {
    /// Plain column field
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verbose_name: None,
            column: None,
            relation: None,
        }
    }

    pub fn foreign_key(name: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(name).with_relation(Relation::new(RelationKind::ForeignKey, to))
    }

    pub fn one_to_one(name: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(name).with_relation(Relation::new(RelationKind::OneToOne, to))
    }

    pub fn many_to_many(name: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(name).with_relation(Relation::new(RelationKind::ManyToMany, to))
    }

    pub fn with_verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = Some(verbose_name.into());
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relation = Some(relation);
        self
    }

    /// Set the reverse accessor name. No-op on non-relation fields.
    pub fn with_related_name(mut self, related_name: impl Into<String>) -> Self {
        if let Some(relation) = self.relation.as_mut() {
            relation.related_name = Some(related_name.into());
        }
        self
    }

    /// Set the reverse query name. No-op on non-relation fields.
    pub fn with_related_query_name(mut self, related_query_name: impl Into<String>) -> Self {
        if let Some(relation) = self.relation.as_mut() {
            relation.related_query_name = Some(related_query_name.into());
        }
        self
    }

    /// Set the join table. No-op on non-relation fields.
    pub fn with_through(mut self, through: impl Into<String>) -> Self {
        if let Some(relation) = self.relation.as_mut() {
            relation.through = Some(through.into());
        }
        self
    }

    /// Set whether a self-referential many-to-many works both ways.
    /// No-op on non-relation fields.
    pub fn with_symmetrical(mut self, symmetrical: bool) -> Self {
        if let Some(relation) = self.relation.as_mut() {
            relation.symmetrical = Some(symmetrical);
        }
        self
    }

    pub fn is_relation(&self) -> bool {
        self.relation.is_some()
    }

    pub fn is_many_to_many(&self) -> bool {
        self.relation
            .as_ref()
            .is_some_and(|r| r.kind == RelationKind::ManyToMany)
    }

    /// Human-readable caption, defaulting to the name with underscores as spaces
    pub fn caption(&self) -> String {
        self.verbose_name
            .clone()
            .unwrap_or_else(|| self.name.replace('_', " "))
    }

    /// Column holding this field's value on the model's own table.
    ///
    /// Forward to-one relations store the target key in `<name>_id`.
    pub fn column_name(&self) -> String {
        if let Some(column) = &self.column {
            return column.clone();
        }
        match &self.relation {
            Some(relation) if relation.kind.is_to_one() => format!("{}_id", self.name),
            _ => self.name.clone(),
        }
    }
}

fn default_pk() -> String {
    "id".to_string()
}

/// A model (table) definition
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSchema {
    /// Set by the registry when the model is registered
    #[serde(skip)]
    pub app_label: String,
    /// Declared name, e.g. `ContentType`
    pub name: String,
    #[serde(default)]
    pub verbose_name: Option<String>,
    #[serde(default)]
    pub db_table: Option<String>,
    #[serde(default = "default_pk")]
    pub pk: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            app_label: String::new(),
            name: name.into(),
            verbose_name: None,
            db_table: None,
            pk: default_pk(),
            fields: Vec::new(),
        }
    }

    pub fn with_verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = Some(verbose_name.into());
        self
    }

    pub fn with_db_table(mut self, db_table: impl Into<String>) -> Self {
        self.db_table = Some(db_table.into());
        self
    }

    pub fn with_pk(mut self, pk: impl Into<String>) -> Self {
        self.pk = pk.into();
        self
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Lower-cased name used for lookups, accessors and default table names
    pub fn model_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Human-readable caption, defaulting to the declared name split into words
    pub fn caption(&self) -> String {
        self.verbose_name
            .clone()
            .unwrap_or_else(|| self.name.to_case(Case::Lower))
    }

    pub fn table_name(&self) -> String {
        self.db_table
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.app_label, self.model_name()))
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn key(&self) -> ModelKey {
        ModelKey {
            app_label: self.app_label.clone(),
            model: self.model_name(),
        }
    }
}

/// Fully qualified model reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub app_label: String,
    pub model: String,
}

impl ModelKey {
    /// Parse `"app.model"`, or `"model"` relative to `current_app`
    pub fn parse(current_app: &str, reference: &str) -> Self {
        match reference.split_once('.') {
            Some((app_label, model)) => Self {
                app_label: app_label.to_string(),
                model: model.to_lowercase(),
            },
            None => Self {
                app_label: current_app.to_string(),
                model: reference.to_lowercase(),
            },
        }
    }
}

impl std::fmt::Display for ModelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.app_label, self.model)
    }
}

/// The reverse side of a relation declared on another model
#[derive(Debug, Clone, Copy)]
pub struct ReverseRelation<'a> {
    /// Model declaring the relation
    pub source: &'a ModelSchema,
    /// Relation field on `source`
    pub field: &'a FieldDef,
    pub relation: &'a Relation,
}

impl ReverseRelation<'_> {
    /// Name used for this relation in lookup paths and field enumeration
    pub fn query_name(&self) -> String {
        self.relation
            .related_query_name
            .clone()
            .or_else(|| self.relation.related_name.clone())
            .unwrap_or_else(|| self.source.model_name())
    }

    /// Name of the accessor reaching the source rows from the target model
    pub fn accessor_name(&self) -> String {
        if let Some(name) = &self.relation.related_name {
            return name.clone();
        }
        match self.relation.kind {
            RelationKind::OneToOne => self.source.model_name(),
            _ => format!("{}_set", self.source.model_name()),
        }
    }

    pub fn kind(&self) -> RelationKind {
        self.relation.kind
    }
}

/// A field reachable by name from a model, either declared or reverse
#[derive(Debug, Clone, Copy)]
pub enum ResolvedField<'a> {
    Forward {
        model: &'a ModelSchema,
        field: &'a FieldDef,
    },
    Reverse(ReverseRelation<'a>),
}

impl<'a> ResolvedField<'a> {
    pub fn name(&self) -> String {
        match self {
            ResolvedField::Forward { field, .. } => field.name.clone(),
            ResolvedField::Reverse(reverse) => reverse.query_name(),
        }
    }

    pub fn is_relation(&self) -> bool {
        match self {
            ResolvedField::Forward { field, .. } => field.is_relation(),
            ResolvedField::Reverse(_) => true,
        }
    }

    /// Caption of the field itself; reverse relations have none
    pub fn own_caption(&self) -> Option<String> {
        match self {
            ResolvedField::Forward { field, .. } => Some(field.caption()),
            ResolvedField::Reverse(_) => None,
        }
    }

    /// Model on the other end of the relation, `None` for plain fields
    pub fn related_model(&self, registry: &'a SchemaRegistry) -> Result<Option<&'a ModelSchema>> {
        match self {
            ResolvedField::Forward { model, field } => match &field.relation {
                Some(relation) => registry.resolve_reference(model, &relation.to).map(Some),
                None => Ok(None),
            },
            ResolvedField::Reverse(reverse) => Ok(Some(reverse.source)),
        }
    }
}

/// Models of one application
#[derive(Debug, Clone, Default)]
pub struct AppSchema {
    pub label: String,
    models: IndexMap<String, ModelSchema>,
}

impl AppSchema {
    pub fn models(&self) -> impl Iterator<Item = &ModelSchema> {
        self.models.values()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaFile {
    #[serde(default)]
    apps: Vec<AppDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AppDef {
    label: String,
    #[serde(default)]
    models: Vec<ModelSchema>,
}

/// Registry of all known models, grouped by application label
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    apps: IndexMap<String, AppSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML schema document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: SchemaFile = toml::from_str(source)?;
        let mut registry = Self::new();
        for app in file.apps {
            registry.add_app(&app.label)?;
            for model in app.models {
                registry.register_model(&app.label, model)?;
            }
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Load a TOML schema document from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading schema registry");
        let source = std::fs::read_to_string(path)?;
        let registry = Self::from_toml_str(&source)?;
        tracing::info!(
            path = %path.display(),
            apps = registry.apps.len(),
            "schema registry loaded"
        );
        Ok(registry)
    }

    fn add_app(&mut self, label: &str) -> Result<()> {
        if label.trim().is_empty() {
            return Err(UnloadError::Schema("app label must not be empty".into()));
        }
        if self.apps.contains_key(label) {
            return Err(UnloadError::Schema(format!("duplicate app '{}'", label)));
        }
        self.apps.insert(
            label.to_string(),
            AppSchema {
                label: label.to_string(),
                models: IndexMap::new(),
            },
        );
        Ok(())
    }

    /// Register a model under `app_label`, creating the app on first use
    pub fn register_model(&mut self, app_label: &str, mut model: ModelSchema) -> Result<()> {
        if !self.apps.contains_key(app_label) {
            self.add_app(app_label)?;
        }
        if model.name.trim().is_empty() {
            return Err(UnloadError::Schema(format!(
                "model name must not be empty in app '{}'",
                app_label
            )));
        }
        model.app_label = app_label.to_string();
        let model_name = model.model_name();

        let mut seen = HashSet::new();
        for field in &model.fields {
            if field.name.trim().is_empty() {
                return Err(UnloadError::Schema(format!(
                    "field name must not be empty on '{}.{}'",
                    app_label, model_name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(UnloadError::Schema(format!(
                    "duplicate field '{}' on '{}.{}'",
                    field.name, app_label, model_name
                )));
            }
        }

        let Some(app) = self.apps.get_mut(app_label) else {
            return Err(UnloadError::Schema(format!("unknown app '{}'", app_label)));
        };
        if app.models.contains_key(&model_name) {
            return Err(UnloadError::Schema(format!(
                "duplicate model '{}.{}'",
                app_label, model_name
            )));
        }
        app.models.insert(model_name.clone(), model);

        let checked = self.check_all_reverse_names();
        if checked.is_err()
            && let Some(app) = self.apps.get_mut(app_label)
        {
            app.models.shift_remove(&model_name);
        }
        checked
    }

    /// Builder form of `register_model`
    pub fn with_model(mut self, app_label: &str, model: ModelSchema) -> Result<Self> {
        self.register_model(app_label, model)?;
        Ok(self)
    }

    /// Reverse query names and accessor names on `model` must be unique and
    /// must not shadow a declared field
    fn check_reverse_names(&self, model: &ModelSchema) -> Result<()> {
        let mut query_names = HashSet::new();
        let mut accessor_names = HashSet::new();
        for reverse in self.reverse_relations(model) {
            let query_name = reverse.query_name();
            let accessor_name = reverse.accessor_name();
            let clash = if model.field(&query_name).is_some()
                || !query_names.insert(query_name.clone())
            {
                Some(("query name", query_name))
            } else if model.field(&accessor_name).is_some()
                || !accessor_names.insert(accessor_name.clone())
            {
                Some(("accessor", accessor_name))
            } else {
                None
            };
            if let Some((kind, name)) = clash {
                return Err(UnloadError::Schema(format!(
                    "reverse {} '{}' for '{}.{}' clashes with another name on '{}'",
                    kind,
                    name,
                    reverse.source.key(),
                    reverse.field.name,
                    model.key()
                )));
            }
        }
        Ok(())
    }

    fn check_all_reverse_names(&self) -> Result<()> {
        self.models()
            .try_for_each(|model| self.check_reverse_names(model))
    }

    /// Check that every relation points at a registered model and that no
    /// reverse names clash
    pub fn validate(&self) -> Result<()> {
        for model in self.models() {
            for field in &model.fields {
                if let Some(relation) = &field.relation {
                    self.resolve_reference(model, &relation.to).map_err(|_| {
                        UnloadError::Schema(format!(
                            "field '{}' on '{}' points at unknown model '{}'",
                            field.name,
                            model.key(),
                            relation.to
                        ))
                    })?;
                }
            }
        }
        self.check_all_reverse_names()
    }

    pub fn apps(&self) -> impl Iterator<Item = &AppSchema> {
        self.apps.values()
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelSchema> {
        self.apps.values().flat_map(|app| app.models.values())
    }

    /// Look up a model; the model name is matched case-insensitively
    pub fn get_model(&self, app_label: &str, model_name: &str) -> Result<&ModelSchema> {
        self.apps
            .get(app_label)
            .and_then(|app| app.models.get(&model_name.to_lowercase()))
            .ok_or_else(|| UnloadError::model_not_found(app_label, model_name))
    }

    /// Resolve a relation target written relative to `from`
    pub fn resolve_reference(&self, from: &ModelSchema, reference: &str) -> Result<&ModelSchema> {
        let key = ModelKey::parse(&from.app_label, reference);
        self.get_model(&key.app_label, &key.model)
    }

    /// Relations declared on other models (or this one) that point at `model`
    pub fn reverse_relations<'a>(&'a self, model: &ModelSchema) -> Vec<ReverseRelation<'a>> {
        let target = model.key();
        let mut reverse = Vec::new();
        for source in self.models() {
            for field in &source.fields {
                let Some(relation) = &field.relation else {
                    continue;
                };
                if relation.is_hidden() || relation.is_symmetrical(source) {
                    continue;
                }
                if ModelKey::parse(&source.app_label, &relation.to) == target {
                    reverse.push(ReverseRelation {
                        source,
                        field,
                        relation,
                    });
                }
            }
        }
        reverse
    }

    /// Find a declared field, or a reverse relation by its query name
    pub fn resolve_field<'a>(
        &'a self,
        model: &'a ModelSchema,
        name: &str,
    ) -> Option<ResolvedField<'a>> {
        if let Some(field) = model.field(name) {
            return Some(ResolvedField::Forward { model, field });
        }
        self.reverse_relations(model)
            .into_iter()
            .find(|reverse| reverse.query_name() == name)
            .map(ResolvedField::Reverse)
    }

    /// Find a reverse relation by its accessor name
    pub fn resolve_accessor<'a>(
        &'a self,
        model: &ModelSchema,
        accessor: &str,
    ) -> Option<ReverseRelation<'a>> {
        self.reverse_relations(model)
            .into_iter()
            .find(|reverse| reverse.accessor_name() == accessor)
    }

    /// All fields of a model: reverse relations, then declared fields with
    /// many-to-many fields last
    pub fn fields<'a>(&'a self, model: &'a ModelSchema) -> Vec<ResolvedField<'a>> {
        let mut fields: Vec<ResolvedField<'a>> = self
            .reverse_relations(model)
            .into_iter()
            .map(ResolvedField::Reverse)
            .collect();
        let (many_to_many, local): (Vec<&FieldDef>, Vec<&FieldDef>) =
            model.fields.iter().partition(|f| f.is_many_to_many());
        fields.extend(
            local
                .into_iter()
                .chain(many_to_many)
                .map(|field| ResolvedField::Forward { model, field }),
        );
        fields
    }
}
