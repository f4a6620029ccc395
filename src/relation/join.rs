//! Join descriptors.
//!
//! A relation embedded in a parent query contributes a [`JoinPlan`]: an ordered
//! list of [`JoinDescriptor`]s keyed by name (`{rel}_through`, then `{rel}`).
//! Each descriptor knows its table and alias, join kind, ON predicates,
//! selected columns and ordering, and can merge itself into a sea-query
//! `SelectStatement`.

use crate::query::condition::{iden, JoinKind, OrderEntry, Predicate};
use crate::query::select::{aliased_table, push_order};
use sea_query::{Asterisk, Condition, SelectStatement};

/// One table joined into a parent query
#[derive(Debug, Clone, PartialEq)]
pub struct JoinDescriptor {
    /// Model type name; `None` for the through table
    pub model: Option<String>,
    pub table: String,
    pub alias: String,
    /// Primary key columns of the joined model; empty for the through table
    pub primary_key: Vec<String>,
    pub join_type: JoinKind,
    /// ON predicates, AND-ed
    pub join_on: Vec<Predicate>,
    /// Selected columns, qualified with the alias; `alias.*` selects every column
    pub columns: Vec<String>,
    /// Name the joined rows are stored under on the parent; `None` for the through table
    pub rel_name: Option<String>,
    pub order_by: Vec<OrderEntry>,
}

impl JoinDescriptor {
    /// ON condition for this join
    pub fn on_condition(&self) -> Condition {
        self.join_on
            .iter()
            .fold(Condition::all(), |condition, predicate| condition.add(predicate.to_expr()))
    }

    /// Merge the join, its columns and its ordering into `query`
    pub fn apply(&self, query: &mut SelectStatement) {
        query.join(
            self.join_type.into(),
            aliased_table(&self.table, &self.alias),
            self.on_condition(),
        );
        for column in &self.columns {
            match column.rsplit_once('.') {
                Some((alias, "*")) => {
                    query.column((iden(alias), Asterisk));
                }
                Some((alias, name)) => {
                    query.column((iden(alias), iden(name)));
                }
                None => {
                    query.column(iden(column));
                }
            }
        }
        for entry in &self.order_by {
            push_order(query, entry);
        }
    }
}

/// Ordered, named join descriptors contributed by one relation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinPlan {
    entries: Vec<(String, JoinDescriptor)>,
}

impl JoinPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, descriptor: JoinDescriptor) {
        self.entries.push((name.into(), descriptor));
    }

    pub fn get(&self, name: &str) -> Option<&JoinDescriptor> {
        self.entries.iter().find(|(key, _)| key == name).map(|(_, descriptor)| descriptor)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut JoinDescriptor> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, descriptor)| descriptor)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JoinDescriptor)> {
        self.entries.iter().map(|(name, descriptor)| (name.as_str(), descriptor))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge every descriptor into `query`, in order
    pub fn apply(&self, query: &mut SelectStatement) {
        for (_, descriptor) in &self.entries {
            descriptor.apply(query);
        }
    }
}
