//! Unlinking on source deletion.

use crate::error::{RelationError, Result};
use crate::model::Model;
use crate::relation::links::{LinkMap, Related};
use crate::relation::many_many::ManyMany;
use sea_query::PostgresQueryBuilder;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

impl ManyMany {
    /// Unlink everything from a deleted source model.
    ///
    /// Clears the source's relation cache, deletes every through row of the
    /// source and, when cascading, deletes each previously linked model.
    /// `cascade` overrides `cascade_delete` for this call. Nothing happens
    /// unless `parent_deleted` is true.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` if the source key is NULL.
    /// Storage and model errors propagate unchanged.
    pub fn delete(
        &self,
        source: &mut dyn Model,
        previous: Related,
        parent_deleted: bool,
        cascade: Option<bool>,
    ) -> Result<()> {
        if !parent_deleted {
            log::debug!("{}: source was not deleted, keeping links", self.name);
            return Ok(());
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::relation_span("delete", &self.name).entered();

        source.replace_related(&self.name, Related::Many(LinkMap::new()));
        self.delete_related(&*source)?;

        if cascade.unwrap_or(self.cascade_delete) && !previous.is_empty() {
            for model in previous.models() {
                model
                    .try_borrow_mut()
                    .map_err(|_| RelationError::model(self.model_to.as_str(), "model is already borrowed"))?
                    .delete(None)?;
            }
        }
        Ok(())
    }

    /// Delete every through row of `source`, returning the number of rows removed
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` if the source key is NULL.
    pub fn delete_related(&self, source: &dyn Model) -> Result<u64> {
        let source_keys = self.keys.source_values(&self.name, source)?.ok_or_else(|| {
            RelationError::configuration(
                self.name.as_str(),
                format!("{} model has no key value", source.model_name()),
            )
        })?;
        let (sql, values) = self.through_delete(source_keys.iter()).build(PostgresQueryBuilder);
        let removed = self.execute(&*self.source_type.connection(), &sql, &values)?;
        log::debug!("{}: removed {} link(s)", self.name, removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelationConfig;
    use crate::model::{model_ref, ModelRegistry};
    use crate::naming::DefaultNaming;
    use crate::test_helpers::{MemoryModel, MemoryModelType, RecordingExecutor};
    use sea_query::Value;
    use std::sync::Arc;

    fn post_tags(config: RelationConfig) -> (ManyMany, Arc<RecordingExecutor>) {
        let executor = Arc::new(RecordingExecutor::new());
        let mut registry = ModelRegistry::new();
        registry.register(Arc::new(MemoryModelType::new("Post", "posts", executor.clone())));
        registry.register(Arc::new(MemoryModelType::new("Tag", "tags", executor.clone())));
        let config = config
            .table_through("post_tag")
            .key_through_from(["post_id"])
            .key_through_to(["tag_id"]);
        let relation = ManyMany::new("Post", "tags", &config, &registry, &DefaultNaming).unwrap();
        (relation, executor)
    }

    #[test]
    fn test_noop_when_parent_not_deleted() {
        let (relation, executor) = post_tags(RelationConfig::new());
        let mut post = MemoryModel::new("Post").with("id", 1i64);

        assert!(relation.delete(&mut post, Related::None, false, Some(true)).is_ok());
        assert!(executor.statements().is_empty());
    }

    #[test]
    fn test_clears_cache_and_through_rows() {
        let (relation, executor) = post_tags(RelationConfig::new());
        let tag = MemoryModel::new("Tag").with("id", 2i64).persisted();
        let journal = tag.journal();
        let links = LinkMap::new().with("2", model_ref(tag));
        let mut post = MemoryModel::new("Post").with("id", 1i64);
        post.replace_related("tags", Related::from(links.clone()));

        relation.delete(&mut post, Related::from(links), true, None).unwrap();

        assert!(post.related("tags").is_some_and(Related::is_empty));
        let statements = executor.statements();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].0, r#"DELETE FROM "post_tag" WHERE "post_id" = $1"#);
        assert_eq!(statements[0].1 .0, vec![Value::BigInt(Some(1))]);
        assert!(journal.events().is_empty());
    }

    #[test]
    fn test_cascade_deletes_previous_models() {
        let (relation, _) = post_tags(RelationConfig::new().cascade_delete(true));
        let tag = MemoryModel::new("Tag").with("id", 2i64).persisted();
        let journal = tag.journal();
        let mut post = MemoryModel::new("Post").with("id", 1i64);

        let previous = Related::from(LinkMap::new().with("2", model_ref(tag)));
        relation.delete(&mut post, previous, true, None).unwrap();
        assert_eq!(journal.events(), vec!["delete Tag cascade=None".to_string()]);
    }

    #[test]
    fn test_delete_related_counts_rows() {
        let (relation, executor) = post_tags(RelationConfig::new());
        executor.push_affected(3);
        let post = MemoryModel::new("Post").with("id", 1i64);

        assert_eq!(relation.delete_related(&post).unwrap(), 3);
    }
}
