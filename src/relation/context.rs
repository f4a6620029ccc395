//! Per-call query context and field aliasing.
//!
//! A [`QueryContext`] is built fresh for every `get` / `join` call and passed
//! down to the builders; nothing call-scoped lives on the relation itself.
//!
//! [`FieldAliaser`] rewrites user-written column references into the aliases of
//! the current context:
//!
//! - raw expressions are returned unchanged
//! - unqualified columns get the default alias for the clause being built
//! - `table.column` references to the through, target or source table get that
//!   table's alias; references to any other table are left alone
//!
//! Qualifiers are only replaced at identifier boundaries, so a table named
//! `post` does not touch a column named `blog_post.id`.

use crate::error::{RelationError, Result};
use crate::query::condition::{Field, Operand, OrderEntry, Predicate};
use regex::{Captures, Regex};

/// Table aliases for one resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    /// Alias of the target table
    pub alias_to: String,
    /// Alias of the through table
    pub alias_through: String,
    /// Alias of the source table; absent when fetching for a single source model
    pub alias_from: Option<String>,
}

impl QueryContext {
    /// Context of a standalone fetch: target is `t0`, through is `t0_through`
    pub fn fetch() -> Self {
        Self {
            alias_to: "t0".to_string(),
            alias_through: "t0_through".to_string(),
            alias_from: None,
        }
    }

    /// Context of a nested join: target is `t{nr}`, anchored on `alias_from`
    pub fn nested(alias_from: &str, alias_to_nr: usize) -> Self {
        let alias_to = format!("t{}", alias_to_nr);
        Self {
            alias_through: format!("{}_through", alias_to),
            alias_to,
            alias_from: Some(alias_from.to_string()),
        }
    }
}

/// Which of the relation's tables a qualifier names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRole {
    Through,
    Target,
    Source,
}

/// Rewrites table qualifiers into context aliases
#[derive(Debug, Clone)]
pub struct FieldAliaser {
    // Lookup order decides ties when two roles share a table name
    tables: Vec<(TableRole, String)>,
    qualifier: Regex,
}

impl FieldAliaser {
    /// Build an aliaser for a relation's three tables
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` if the qualifier pattern cannot be compiled.
    pub fn new(relation: &str, through: &str, target: &str, source: &str) -> Result<Self> {
        let tables = vec![
            (TableRole::Through, through.to_string()),
            (TableRole::Target, target.to_string()),
            (TableRole::Source, source.to_string()),
        ];
        let mut names: Vec<&str> = tables.iter().map(|(_, name)| name.as_str()).collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        names.dedup();
        let alternation = names.iter().map(|name| regex::escape(name)).collect::<Vec<_>>().join("|");
        let qualifier = Regex::new(&format!(r"(^|[^A-Za-z0-9_])({})\.", alternation))
            .map_err(|e| RelationError::configuration(relation, format!("invalid table name: {}", e)))?;
        Ok(Self { tables, qualifier })
    }

    /// Role of the table a `table.column` reference is qualified with
    pub fn role_of(&self, column: &str) -> Option<TableRole> {
        let (table, _) = column.split_once('.')?;
        self.role_of_table(table)
    }

    fn role_of_table(&self, table: &str) -> Option<TableRole> {
        self.tables
            .iter()
            .find(|(_, name)| name == table)
            .map(|(role, _)| *role)
    }

    fn alias_for<'a>(&self, role: TableRole, ctx: &'a QueryContext) -> Option<&'a str> {
        match role {
            TableRole::Through => Some(ctx.alias_through.as_str()),
            TableRole::Target => Some(ctx.alias_to.as_str()),
            TableRole::Source => ctx.alias_from.as_deref(),
        }
    }

    /// Alias a column reference, qualifying bare names with `default_alias`.
    ///
    /// `column` is a column name, optionally `table.column` qualified. SQL
    /// expressions belong in [`Field::Raw`], which is never rewritten.
    ///
    /// # Example
    ///
    /// ```
    /// use throughway::relation::context::{FieldAliaser, QueryContext};
    ///
    /// let aliaser = FieldAliaser::new("tags", "post_tag", "tags", "posts").unwrap();
    /// let ctx = QueryContext::nested("t_src", 1);
    ///
    /// assert_eq!(aliaser.alias_column("posts.name", &ctx, "t1"), "t_src.name");
    /// assert_eq!(aliaser.alias_column("name", &ctx, "t1"), "t1.name");
    /// assert_eq!(aliaser.alias_column("users.name", &ctx, "t1"), "users.name");
    /// ```
    pub fn alias_column(&self, column: &str, ctx: &QueryContext, default_alias: &str) -> String {
        if !column.contains('.') {
            return format!("{}.{}", default_alias, column);
        }
        self.qualifier
            .replace_all(column, |caps: &Captures<'_>| {
                let table = &caps[2];
                match self.role_of_table(table).and_then(|role| self.alias_for(role, ctx)) {
                    Some(alias) => format!("{}{}.", &caps[1], alias),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Alias a predicate field; raw and bound fields pass through
    pub fn alias_field(&self, field: &Field, ctx: &QueryContext, default_alias: &str) -> Field {
        match field {
            Field::Column(column) => Field::Column(self.alias_column(column, ctx, default_alias)),
            other => other.clone(),
        }
    }

    /// Alias both sides of a predicate
    pub fn alias_predicate(&self, predicate: Predicate, ctx: &QueryContext, default_alias: &str) -> Predicate {
        let operand = match predicate.operand {
            Operand::Column(column) => Operand::Column(self.alias_column(&column, ctx, default_alias)),
            other => other,
        };
        Predicate {
            field: self.alias_field(&predicate.field, ctx, default_alias),
            op: predicate.op,
            operand,
        }
    }

    /// Alias an order entry; raw expressions pass through
    pub fn alias_order(&self, entry: &OrderEntry, ctx: &QueryContext, default_alias: &str) -> OrderEntry {
        match entry {
            OrderEntry::Field { field, direction } => OrderEntry::Field {
                field: self.alias_column(field, ctx, default_alias),
                direction: *direction,
            },
            raw => raw.clone(),
        }
    }
}
