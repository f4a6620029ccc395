//! Model capabilities consumed by the relation resolver.
//!
//! Two traits split what the resolver needs from the surrounding ORM:
//!
//! - [`ModelType`]: per-type metadata (table, primary key, connection) and row
//!   hydration. Every model type implements it once; the resolver looks types up
//!   by name through a [`ModelRegistry`].
//! - [`Model`]: a single instance: field access, persistence state, save/delete,
//!   and its relation cache.
//!
//! Instances are shared as [`ModelRef`] because the same target model can sit
//! in the caller's link set and in the source model's relation cache at once.

use crate::error::{RelationError, Result};
use crate::executor::{Executor, Row};
use crate::relation::links::Related;
use sea_query::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Shared handle to a model instance
pub type ModelRef = Rc<RefCell<dyn Model>>;

/// Wrap a model into a [`ModelRef`]
pub fn model_ref<M: Model + 'static>(model: M) -> ModelRef {
    Rc::new(RefCell::new(model))
}

/// Static metadata and hydration for one model type
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use throughway::executor::{Executor, Row};
/// use throughway::model::{ModelRef, ModelType};
/// use throughway::RelationError;
///
/// struct TagType {
///     pk: Vec<String>,
///     columns: Vec<String>,
///     connection: Arc<dyn Executor>,
/// }
///
/// impl ModelType for TagType {
///     fn name(&self) -> &str { "Tag" }
///     fn table_name(&self) -> &str { "tags" }
///     fn primary_key(&self) -> &[String] { &self.pk }
///     fn columns(&self) -> &[String] { &self.columns }
///     fn connection(&self) -> Arc<dyn Executor> { Arc::clone(&self.connection) }
///     fn hydrate(&self, _row: &Row) -> Result<ModelRef, RelationError> { todo!() }
/// }
/// ```
pub trait ModelType: Send + Sync {
    /// Type identifier, as used in relation configuration
    fn name(&self) -> &str;

    /// Table the type is stored in
    fn table_name(&self) -> &str;

    /// Primary key columns, in key order
    fn primary_key(&self) -> &[String];

    /// Columns selected when the type is joined into another query.
    ///
    /// An empty slice selects `alias.*`.
    fn columns(&self) -> &[String] {
        &[]
    }

    /// Executor (connection) statements for this type run on
    fn connection(&self) -> Arc<dyn Executor>;

    /// Build an instance from a fetched row
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Model` if the row does not describe a valid instance.
    fn hydrate(&self, row: &Row) -> Result<ModelRef>;
}

impl fmt::Debug for dyn ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.name())
            .field("table_name", &self.table_name())
            .field("primary_key", &self.primary_key())
            .finish()
    }
}

/// A model instance as seen by the relation resolver
pub trait Model: fmt::Debug {
    /// Name of this instance's [`ModelType`]
    fn model_name(&self) -> &str;

    /// Read a field.
    ///
    /// `None` means the model has no such field; a field holding NULL returns
    /// `Some` of a null value.
    fn get(&self, field: &str) -> Option<Value>;

    /// Whether the instance has never been persisted
    fn is_new(&self) -> bool;

    /// Persist the instance. `cascade` of `None` applies the model's own defaults.
    fn save(&mut self, cascade: Option<bool>) -> Result<()>;

    /// Delete the instance. `cascade` of `None` applies the model's own defaults.
    fn delete(&mut self, cascade: Option<bool>) -> Result<()>;

    /// Current relation cache entry for `relation`
    fn related(&self, relation: &str) -> Option<&Related>;

    /// Replace the relation cache entry for `relation`.
    ///
    /// Implementations must not mark the model as changed: this is bookkeeping
    /// after persistence, not a user edit.
    fn replace_related(&mut self, relation: &str, value: Related);
}

/// Lookup of model types by name
#[derive(Default, Clone)]
pub struct ModelRegistry {
    types: HashMap<String, Arc<dyn ModelType>>,
}

impl ModelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model type under its own name, replacing any previous entry
    pub fn register(&mut self, model_type: Arc<dyn ModelType>) -> &mut Self {
        self.types.insert(model_type.name().to_string(), model_type);
        self
    }

    /// Resolve a model type by name
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn ModelType>> {
        self.types.get(name).cloned()
    }

    /// Whether a model type is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Resolve a model type, failing with a configuration error for `relation`
    pub(crate) fn require(&self, relation: &str, name: &str) -> Result<Arc<dyn ModelType>> {
        self.resolve(name).ok_or_else(|| {
            RelationError::configuration(relation, format!("related model not found: {}", name))
        })
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.types.keys().collect();
        names.sort();
        f.debug_struct("ModelRegistry").field("types", &names).finish()
    }
}
