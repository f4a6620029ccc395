//! Relations keyed by source model and relation name.

use crate::config::ResolverConfig;
use crate::error::Result;
use crate::model::ModelRegistry;
use crate::naming::Naming;
use crate::relation::many_many::ManyMany;
use crate::relation::traits::Relation;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Every relation known to the resolver
#[derive(Debug, Clone, Default)]
pub struct Relations {
    entries: BTreeMap<(String, String), Arc<dyn Relation>>,
}

impl Relations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a `ManyMany` for every relation declared in `config`
    ///
    /// # Errors
    ///
    /// Fails on the first relation that cannot be built.
    pub fn from_config(config: &ResolverConfig, registry: &ModelRegistry, naming: &dyn Naming) -> Result<Self> {
        let mut relations = Self::new();
        for (model, declared) in &config.relations {
            for (name, options) in declared {
                let relation = ManyMany::new(model, name, options, registry, naming)?;
                relations.insert(Arc::new(relation));
            }
        }
        log::debug!("Built {} relation(s) from configuration", relations.len());
        Ok(relations)
    }

    /// Register a relation under its source model and name, replacing any previous one
    pub fn insert(&mut self, relation: Arc<dyn Relation>) -> &mut Self {
        let key = (relation.model_from().to_string(), relation.name().to_string());
        self.entries.insert(key, relation);
        self
    }

    pub fn get(&self, model: &str, name: &str) -> Option<Arc<dyn Relation>> {
        self.entries
            .get(&(model.to_string(), name.to_string()))
            .cloned()
    }

    /// Relations declared on `model`, by name
    pub fn for_model(&self, model: &str) -> Vec<Arc<dyn Relation>> {
        self.entries
            .iter()
            .filter(|((from, _), _)| from == model)
            .map(|(_, relation)| Arc::clone(relation))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
