//! # Throughway
//!
//! Many-to-many relation resolver for the lifeguard ORM.
//!
//! A [`ManyMany`](relation::ManyMany) relation links a source model type to a
//! target model type through an association table. The resolver:
//!
//! - fetches the targets linked to a source model
//! - contributes through and target joins to a parent query
//! - reconciles the through table with a desired link set on save
//! - unlinks (and optionally cascades) when the source is deleted
//!
//! Statements are built with `sea-query` and run on the [`Executor`] each
//! model type exposes.

pub mod config;
pub mod error;
pub mod executor;
pub mod model;
pub mod naming;
pub mod query;
pub mod relation;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
#[cfg(feature = "tracing")]
pub mod tracing_helpers;
pub mod value;

pub use config::{RelationConfig, ResolverConfig};
pub use error::RelationError;
pub use executor::{Executor, ExecutorError, Row};
pub use model::{model_ref, Model, ModelRef, ModelRegistry, ModelType};
pub use naming::{DefaultNaming, Naming};
pub use query::{ConditionBag, ConditionEntry, Direction, JoinKind, Operator, OrderEntry};
pub use relation::{JoinPlan, LinkId, LinkMap, ManyMany, Related, Relation, Relations};
