//! Relation module for many-to-many relationships.
//!
//! This module resolves relations that go through an association table:
//! - fetching the models linked to a source model
//! - joining the relation into a parent query
//! - reconciling the through table when the source is saved or deleted
//!
//! # Architecture
//!
//! - **Traits**: the object-safe [`Relation`] trait
//! - **ManyMany**: the relation descriptor and its fetch/join logic
//! - **Sync / Unlink**: persistence on save and delete
//! - **Context / Filter**: per-call aliases and condition normalization
//! - **Keys / Links**: positional key mapping and link identifiers
//! - **Registry**: relations by (model, name)

// Per-call aliasing
pub mod context;
#[doc(inline)]
pub use context::{FieldAliaser, QueryContext, TableRole};

// Conditions
pub mod filter;
#[doc(inline)]
pub use filter::ConditionBuilder;

// Key mapping
pub mod keys;
#[doc(inline)]
pub use keys::KeyMap;

// Link identifiers and sets
pub mod links;
#[doc(inline)]
pub use links::{LinkId, LinkMap, Related};

// Join descriptors
pub mod join;
#[doc(inline)]
pub use join::{JoinDescriptor, JoinPlan};

// Relation descriptor
pub mod many_many;
#[doc(inline)]
pub use many_many::ManyMany;

mod sync;
mod unlink;

// Core trait
pub mod traits;
#[doc(inline)]
pub use traits::Relation;

// Registry
pub mod registry;
#[doc(inline)]
pub use registry::Relations;
