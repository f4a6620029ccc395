//! Condition normalization, filters and ordering.
//!
//! `ConditionBuilder` turns user-written condition entries into aliased
//! [`Predicate`]s and [`OrderEntry`]s for one query context.

use crate::error::{RelationError, Result};
use crate::model::Model;
use crate::query::condition::{ConditionEntry, Field, Operand, OrderEntry, Predicate};
use crate::relation::context::{FieldAliaser, QueryContext, TableRole};
use crate::relation::keys::KeyMap;
use sea_query::Value;

/// Builds predicates and ordering for a single resolution
#[derive(Debug, Clone, Copy)]
pub struct ConditionBuilder<'a> {
    relation: &'a str,
    aliaser: &'a FieldAliaser,
    ctx: &'a QueryContext,
}

impl<'a> ConditionBuilder<'a> {
    pub fn new(relation: &'a str, aliaser: &'a FieldAliaser, ctx: &'a QueryContext) -> Self {
        Self { relation, aliaser, ctx }
    }

    /// Normalize and alias `entries`; bare columns get `default_alias`
    pub fn predicates(&self, entries: &[ConditionEntry], default_alias: &str) -> Result<Vec<Predicate>> {
        entries
            .iter()
            .map(|entry| {
                let predicate = entry.normalize(self.relation)?;
                Ok(self.aliaser.alias_predicate(predicate, self.ctx, default_alias))
            })
            .collect()
    }

    /// Normalize and alias `where` entries against the target alias.
    ///
    /// When the context has no source alias, a column qualified with the source
    /// table cannot be joined against. On either side of a clause it is replaced
    /// by that field's current value on `source`, bound as a parameter.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` if such a field does not exist on
    /// the source model, or if there is no source model to read it from.
    pub fn where_predicates(&self, entries: &[ConditionEntry], source: Option<&dyn Model>) -> Result<Vec<Predicate>> {
        let mut predicates = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut predicate = entry.normalize(self.relation)?;
            if self.ctx.alias_from.is_none() {
                let field = self.bind_source_column(predicate.field.as_column(), source)?;
                if let Some(value) = field {
                    predicate.field = Field::Bound(value);
                }
                let operand = match &predicate.operand {
                    Operand::Column(column) => self.bind_source_column(Some(column.as_str()), source)?,
                    _ => None,
                };
                if let Some(value) = operand {
                    predicate.operand = Operand::Value(value);
                }
            }
            predicates.push(self.aliaser.alias_predicate(predicate, self.ctx, &self.ctx.alias_to));
        }
        Ok(predicates)
    }

    /// Current value on `source` of `column`, if it is qualified with the source table
    fn bind_source_column(&self, column: Option<&str>, source: Option<&dyn Model>) -> Result<Option<Value>> {
        let column = match column {
            Some(column) if self.aliaser.role_of(column) == Some(TableRole::Source) => column,
            _ => return Ok(None),
        };
        let (_, name) = column.split_once('.').unwrap_or(("", column));
        let source = source.ok_or_else(|| {
            RelationError::configuration(
                self.relation,
                format!("condition on {} needs a source model", column),
            )
        })?;
        let value = source.get(name).ok_or_else(|| {
            RelationError::configuration(
                self.relation,
                format!("model {} has no field {} (used in condition {})", source.model_name(), name, column),
            )
        })?;
        log::trace!("{}: binding {} to the source model's value", self.relation, column);
        Ok(Some(value))
    }

    /// Equality filters binding the through-table source keys to `source`'s key values.
    ///
    /// Returns `Ok(None)` if any source key is NULL.
    pub fn source_filter(&self, keys: &KeyMap, source: &dyn Model) -> Result<Option<Vec<Predicate>>> {
        let values = match keys.source_values(self.relation, source)? {
            Some(values) => values,
            None => return Ok(None),
        };
        Ok(Some(
            values
                .into_iter()
                .map(|(through, value)| {
                    Predicate::value_eq(format!("{}.{}", self.ctx.alias_through, through), value)
                })
                .collect(),
        ))
    }

    /// Alias order entries; bare columns get `default_alias`, raw expressions stay raw
    pub fn order(&self, entries: &[OrderEntry], default_alias: &str) -> Vec<OrderEntry> {
        entries
            .iter()
            .map(|entry| self.aliaser.alias_order(entry, self.ctx, default_alias))
            .collect()
    }
}
