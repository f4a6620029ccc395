//! Query building blocks shared by relations.
//!
//! - `condition`: condition bags, predicates and ordering
//! - `select`: `RelatedQuery`, a select builder rooted at an aliased model table

pub mod condition;
pub mod select;

pub use condition::{
    ConditionBag, ConditionEntry, Direction, Field, JoinKind, Operand, Operator, OrderEntry, Predicate,
};
pub use select::RelatedQuery;
