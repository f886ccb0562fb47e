//! SQL generation for streaming row keys and fetching single rows
//!
//! Every exported field is a lookup path. Plain columns select directly from
//! the base table; relation hops become correlated scalar subqueries. Hops
//! that can reach several rows (reverse relations, many-to-many) pick the
//! related row with the lowest key.
//!
//! Reverse relations are reached by their query name only; accessor names
//! such as `order_set` are not valid here.

use unload_core::{
    LOOKUP_SEP, ModelSchema, RelationKind, ResolvedField, Result, SchemaRegistry, UnloadError,
};

const BASE_ALIAS: &str = "t0";

/// Quote an identifier, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn col(alias: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(alias), quote_ident(column))
}

/// Join table and its (source, target) key columns for a many-to-many field
fn through_table(
    declaring: &ModelSchema,
    target: &ModelSchema,
    field_name: &str,
    through: Option<&String>,
) -> (String, String, String) {
    let table = through
        .cloned()
        .unwrap_or_else(|| format!("{}_{}", declaring.table_name(), field_name));
    if declaring.key() == target.key() {
        let name = declaring.model_name();
        (table, format!("from_{}_id", name), format!("to_{}_id", name))
    } else {
        (
            table,
            format!("{}_id", declaring.model_name()),
            format!("{}_id", target.model_name()),
        )
    }
}

struct ExprBuilder<'a> {
    registry: &'a SchemaRegistry,
    lookup: &'a str,
    aliases: usize,
}

impl<'a> ExprBuilder<'a> {
    fn next_alias(&mut self) -> String {
        self.aliases += 1;
        format!("t{}", self.aliases)
    }

    fn invalid(&self, model: &ModelSchema) -> UnloadError {
        UnloadError::invalid_lookup(&model.key().to_string(), self.lookup)
    }

    fn related(&self, field: &ResolvedField<'a>, model: &ModelSchema) -> Result<&'a ModelSchema> {
        field
            .related_model(self.registry)?
            .ok_or_else(|| self.invalid(model))
    }

    /// Scalar expression for `segments` evaluated against `model` aliased as `alias`
    fn expr(&mut self, model: &'a ModelSchema, alias: &str, segments: &[&str]) -> Result<String> {
        let Some((part, rest)) = segments.split_first() else {
            return Err(self.invalid(model));
        };
        let field = self
            .registry
            .resolve_field(model, part)
            .ok_or_else(|| self.invalid(model))?;

        match field {
            ResolvedField::Forward { field: def, .. } => match &def.relation {
                None => {
                    if !rest.is_empty() {
                        return Err(self.invalid(model));
                    }
                    Ok(col(alias, &def.column_name()))
                }
                Some(relation) if relation.kind.is_to_one() => {
                    let fk = col(alias, &def.column_name());
                    if rest.is_empty() {
                        return Ok(fk);
                    }
                    let target = self.related(&field, model)?;
                    let t = self.next_alias();
                    let inner = self.expr(target, &t, rest)?;
                    Ok(format!(
                        "(SELECT {} FROM {} AS {} WHERE {} = {})",
                        inner,
                        quote_ident(&target.table_name()),
                        quote_ident(&t),
                        col(&t, &target.pk),
                        fk
                    ))
                }
                Some(relation) => {
                    let target = self.related(&field, model)?;
                    let (table, source_col, target_col) =
                        through_table(model, target, &def.name, relation.through.as_ref());
                    self.through_expr(
                        model, alias, target, &table, &source_col, &target_col, rest,
                    )
                }
            },
            ResolvedField::Reverse(reverse) => {
                let source = reverse.source;
                match reverse.kind() {
                    RelationKind::ForeignKey | RelationKind::OneToOne => {
                        let s = self.next_alias();
                        let value = if rest.is_empty() {
                            col(&s, &source.pk)
                        } else {
                            self.expr(source, &s, rest)?
                        };
                        Ok(format!(
                            "(SELECT {} FROM {} AS {} WHERE {} = {} ORDER BY {} LIMIT 1)",
                            value,
                            quote_ident(&source.table_name()),
                            quote_ident(&s),
                            col(&s, &reverse.field.column_name()),
                            col(alias, &model.pk),
                            col(&s, &source.pk)
                        ))
                    }
                    RelationKind::ManyToMany => {
                        let (table, declaring_col, model_col) = through_table(
                            source,
                            model,
                            &reverse.field.name,
                            reverse.relation.through.as_ref(),
                        );
                        self.through_expr(
                            model,
                            alias,
                            source,
                            &table,
                            &model_col,
                            &declaring_col,
                            rest,
                        )
                    }
                }
            }
        }
    }

    /// Hop across a join table from `model` (matched on `near_col`) to
    /// `far` (keyed by `far_col`)
    #[allow(clippy::too_many_arguments)]
    fn through_expr(
        &mut self,
        model: &'a ModelSchema,
        alias: &str,
        far: &'a ModelSchema,
        table: &str,
        near_col: &str,
        far_col: &str,
        rest: &[&str],
    ) -> Result<String> {
        let j = self.next_alias();
        if rest.is_empty() {
            return Ok(format!(
                "(SELECT {} FROM {} AS {} WHERE {} = {} ORDER BY {} LIMIT 1)",
                col(&j, far_col),
                quote_ident(table),
                quote_ident(&j),
                col(&j, near_col),
                col(alias, &model.pk),
                col(&j, far_col)
            ));
        }
        let f = self.next_alias();
        let inner = self.expr(far, &f, rest)?;
        Ok(format!(
            "(SELECT {} FROM {} AS {} JOIN {} AS {} ON {} = {} WHERE {} = {} ORDER BY {} LIMIT 1)",
            inner,
            quote_ident(table),
            quote_ident(&j),
            quote_ident(&far.table_name()),
            quote_ident(&f),
            col(&f, &far.pk),
            col(&j, far_col),
            col(&j, near_col),
            col(alias, &model.pk),
            col(&f, &far.pk)
        ))
    }
}

/// Prepared SQL for exporting one model with a fixed field list
#[derive(Debug, Clone)]
pub struct RowQuery {
    table: String,
    pk: String,
    select_list: Vec<String>,
}

impl RowQuery {
    /// Build the select list for `fields` on `model`
    pub fn build(registry: &SchemaRegistry, model: &ModelSchema, fields: &[String]) -> Result<Self> {
        if fields.is_empty() {
            return Err(UnloadError::Schema(format!(
                "no fields to export for '{}'",
                model.key()
            )));
        }

        let mut select_list = Vec::with_capacity(fields.len());
        let mut aliases = 0;
        for lookup in fields {
            let segments: Vec<&str> = lookup.split(LOOKUP_SEP).collect();
            let mut builder = ExprBuilder {
                registry,
                lookup,
                aliases,
            };
            select_list.push(builder.expr(model, BASE_ALIAS, &segments)?);
            aliases = builder.aliases;
        }

        Ok(Self {
            table: model.table_name(),
            pk: model.pk.clone(),
            select_list,
        })
    }

    /// Number of selected columns
    pub fn width(&self) -> usize {
        self.select_list.len()
    }

    /// First chunk of primary keys in ascending order
    pub fn first_ids_sql(&self, chunk_size: usize) -> String {
        format!(
            "SELECT {pk} FROM {table} AS {alias} ORDER BY {pk} LIMIT {chunk_size}",
            pk = col(BASE_ALIAS, &self.pk),
            table = quote_ident(&self.table),
            alias = quote_ident(BASE_ALIAS),
        )
    }

    /// Next chunk of primary keys after the bound parameter
    pub fn next_ids_sql(&self, chunk_size: usize) -> String {
        format!(
            "SELECT {pk} FROM {table} AS {alias} WHERE {pk} > ? ORDER BY {pk} LIMIT {chunk_size}",
            pk = col(BASE_ALIAS, &self.pk),
            table = quote_ident(&self.table),
            alias = quote_ident(BASE_ALIAS),
        )
    }

    /// The exported values of the row whose key is the bound parameter
    pub fn row_sql(&self) -> String {
        format!(
            "SELECT {} FROM {} AS {} WHERE {} = ? LIMIT 1",
            self.select_list.join(", "),
            quote_ident(&self.table),
            quote_ident(BASE_ALIAS),
            col(BASE_ALIAS, &self.pk)
        )
    }
}
