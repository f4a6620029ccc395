//! Core relation trait.
//!
//! `Relation` is the object-safe surface the ORM drives: fetch a link set,
//! contribute joins to a parent query, and keep the through table in sync when
//! the source model is saved or deleted. [`ManyMany`] is the implementation
//! provided by this crate.

use crate::error::Result;
use crate::model::Model;
use crate::query::condition::ConditionBag;
use crate::relation::join::JoinPlan;
use crate::relation::links::{LinkId, LinkMap, Related};
use crate::relation::many_many::ManyMany;
use std::fmt;

/// A relation between two model types
///
/// # Example
///
/// ```no_run
/// use throughway::model::Model;
/// use throughway::query::ConditionBag;
/// use throughway::relation::Relation;
///
/// # fn example(tags: &dyn Relation, post: &dyn Model) -> Result<(), throughway::RelationError> {
/// // Linked tags of a post, with an extra filter for this call only
/// let extra = ConditionBag::from_json(&serde_json::json!({ "where": { "status": "published" } }))
///     .map_err(|e| throughway::RelationError::configuration(tags.name(), e))?;
/// for (id, tag) in tags.get(post, &extra)?.iter() {
///     println!("{} => {:?}", id, tag.borrow().get("name"));
/// }
/// # Ok(())
/// # }
/// ```
pub trait Relation: Send + Sync + fmt::Debug {
    /// Relation name on the source model
    fn name(&self) -> &str;

    /// Source model type name
    fn model_from(&self) -> &str;

    /// Target model type name
    fn model_to(&self) -> &str;

    /// Fetch the models linked to `source`
    fn get(&self, source: &dyn Model, conditions: &ConditionBag) -> Result<LinkMap>;

    /// Join descriptors for embedding the relation in a parent query
    fn join(&self, alias_from: &str, rel_name: &str, alias_to_nr: usize, conditions: &ConditionBag)
        -> Result<JoinPlan>;

    /// Persist the link set of a saved source model
    fn save(
        &self,
        source: &mut dyn Model,
        desired: Related,
        original: &[LinkId],
        parent_saved: bool,
        cascade: Option<bool>,
    ) -> Result<()>;

    /// Unlink everything from a deleted source model
    fn delete(&self, source: &mut dyn Model, previous: Related, parent_deleted: bool, cascade: Option<bool>)
        -> Result<()>;

    /// Qualified columns to select from the through table under `alias`
    fn select_through(&self, alias: &str) -> Vec<String>;
}

impl Relation for ManyMany {
    fn name(&self) -> &str {
        ManyMany::name(self)
    }

    fn model_from(&self) -> &str {
        ManyMany::model_from(self)
    }

    fn model_to(&self) -> &str {
        ManyMany::model_to(self)
    }

    fn get(&self, source: &dyn Model, conditions: &ConditionBag) -> Result<LinkMap> {
        ManyMany::get(self, source, conditions)
    }

    fn join(
        &self,
        alias_from: &str,
        rel_name: &str,
        alias_to_nr: usize,
        conditions: &ConditionBag,
    ) -> Result<JoinPlan> {
        ManyMany::join(self, alias_from, rel_name, alias_to_nr, conditions)
    }

    fn save(
        &self,
        source: &mut dyn Model,
        desired: Related,
        original: &[LinkId],
        parent_saved: bool,
        cascade: Option<bool>,
    ) -> Result<()> {
        ManyMany::save(self, source, desired, original, parent_saved, cascade)
    }

    fn delete(
        &self,
        source: &mut dyn Model,
        previous: Related,
        parent_deleted: bool,
        cascade: Option<bool>,
    ) -> Result<()> {
        ManyMany::delete(self, source, previous, parent_deleted, cascade)
    }

    fn select_through(&self, alias: &str) -> Vec<String> {
        ManyMany::select_through(self, alias)
    }
}
