//! Select query builder for related models.
//!
//! `RelatedQuery` wraps a sea-query `SelectStatement` rooted at an aliased
//! model table. Relations add joins, predicates and ordering to it and then
//! execute it on the model type's connection, hydrating every row.

use crate::error::Result;
use crate::model::{ModelRef, ModelType};
use crate::query::condition::{iden, OrderEntry, Predicate};
use crate::relation::join::JoinDescriptor;
use sea_query::{Asterisk, PostgresQueryBuilder, Query, SelectStatement, TableName, TableRef, Values};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// Aliased table reference: `"table" AS "alias"`
pub(crate) fn aliased_table(table: &str, alias: &str) -> TableRef {
    TableRef::Table(TableName(None, iden(table)), Some(iden(alias)))
}

/// Append `entry` to the ORDER BY clause of `query`
pub(crate) fn push_order(query: &mut SelectStatement, entry: &OrderEntry) {
    match entry.to_order_expr() {
        (expr, order, Some(nulls)) => query.order_by_expr_with_nulls(expr, order, nulls),
        (expr, order, None) => query.order_by_expr(expr, order),
    };
}

/// Plain table reference: `"table"`
pub(crate) fn table(table: &str) -> TableRef {
    TableRef::Table(TableName(None, iden(table)), None)
}

/// Query builder for models reached through a relation
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use sea_query::Value;
/// use throughway::model::ModelType;
/// use throughway::query::condition::Predicate;
/// use throughway::query::select::RelatedQuery;
///
/// # fn example(tags: Arc<dyn ModelType>) -> Result<(), throughway::RelationError> {
/// let models = RelatedQuery::new(tags, "t0")
///     .filter(&Predicate::value_eq("t0.name", Value::from("rust")))
///     .all()?;
/// # Ok(())
/// # }
/// ```
pub struct RelatedQuery {
    pub(crate) query: SelectStatement,
    model_type: Arc<dyn ModelType>,
}

impl RelatedQuery {
    /// Select the model's columns (or `alias.*`) from its table under `alias`
    pub fn new(model_type: Arc<dyn ModelType>, alias: &str) -> Self {
        let mut query = Query::select();
        if model_type.columns().is_empty() {
            query.column((iden(alias), Asterisk));
        } else {
            for column in model_type.columns() {
                query.column((iden(alias), iden(column)));
            }
        }
        query.from(aliased_table(model_type.table_name(), alias));
        Self { query, model_type }
    }

    /// Merge a join descriptor: join clause, selected columns and ordering
    pub fn join(mut self, descriptor: &JoinDescriptor) -> Self {
        descriptor.apply(&mut self.query);
        self
    }

    /// Add a WHERE predicate; predicates are AND-ed
    pub fn filter(mut self, predicate: &Predicate) -> Self {
        self.query.and_where(predicate.to_expr());
        self
    }

    /// Add an ORDER BY entry
    pub fn order_by(mut self, entry: &OrderEntry) -> Self {
        push_order(&mut self.query, entry);
        self
    }

    /// Render the statement for PostgreSQL
    pub fn build(&self) -> (String, Values) {
        self.query.build(PostgresQueryBuilder)
    }

    /// Execute the query on the model type's connection and hydrate every row
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Storage` if the query fails and
    /// `RelationError::Model` if a row cannot be hydrated.
    pub fn all(self) -> Result<Vec<ModelRef>> {
        let (sql, values) = self.build();

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(&sql).entered();

        log::debug!("{} [{} bound]", sql, values.0.len());
        let rows = self.model_type.connection().query_all(&sql, &values)?;

        let mut models = Vec::with_capacity(rows.len());
        for row in &rows {
            models.push(self.model_type.hydrate(row)?);
        }
        Ok(models)
    }
}

impl std::fmt::Debug for RelatedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelatedQuery")
            .field("model", &self.model_type.name())
            .field("sql", &self.build().0)
            .finish()
    }
}
