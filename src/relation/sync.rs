//! Link synchronization: reconcile a desired link set with the through table.
//!
//! `save` walks the desired set in order. Unsaved targets are saved first;
//! targets that were not linked before get a through row, targets that were
//! get their order column refreshed. Whatever was linked before but is no
//! longer desired has its through row deleted. Only through rows are touched:
//! unlinked target models are never deleted here.

use crate::error::{RelationError, Result};
use crate::model::{Model, ModelRef};
use crate::query::condition::{iden, Predicate};
use crate::query::select::table;
use crate::relation::links::{LinkId, LinkMap, Related};
use crate::relation::many_many::ManyMany;
use sea_query::{DeleteStatement, Expr, PostgresQueryBuilder, Query, Value};
use std::rc::Rc;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

impl ManyMany {
    /// Persist the link set of `source`.
    ///
    /// # Arguments
    ///
    /// * `source` - The source model, already saved
    /// * `desired` - The link set the caller wants; `Related::None` unlinks everything
    /// * `original` - Link identifiers that were persisted before this save
    /// * `parent_saved` - Whether the source save went through; `false` makes this a no-op
    /// * `cascade` - Overrides `cascade_save` for this call
    ///
    /// After inserting, entries whose caller key differs from their link
    /// identifier are re-keyed in the source's relation cache.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` if `desired` is not a link set,
    /// holds a model of the wrong type, or if a key is NULL after saving.
    /// Storage and model errors propagate unchanged.
    pub fn save(
        &self,
        source: &mut dyn Model,
        desired: Related,
        original: &[LinkId],
        parent_saved: bool,
        cascade: Option<bool>,
    ) -> Result<()> {
        if !parent_saved {
            log::debug!("{}: source was not saved, skipping link sync", self.name);
            return Ok(());
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::relation_span("save", &self.name).entered();

        let links = match desired {
            Related::None => LinkMap::new(),
            Related::Many(links) => links,
            Related::One(_) => {
                return Err(RelationError::configuration(
                    self.name.as_str(),
                    "assigned relationships must be a keyed set of models or empty",
                ))
            }
        };

        let source_keys = self.keys.source_values(&self.name, &*source)?.ok_or_else(|| {
            RelationError::configuration(
                self.name.as_str(),
                format!("{} model has no key value", source.model_name()),
            )
        })?;
        let executor = self.source_type.connection();

        let mut known: Vec<LinkId> = original.to_vec();
        let mut stale: Vec<LinkId> = Vec::with_capacity(original.len());
        for id in original {
            if !stale.contains(id) {
                stale.push(id.clone());
            }
        }
        let mut rekeyed: Vec<(String, LinkId, ModelRef)> = Vec::new();

        for (position, (key, model)) in links.iter().enumerate() {
            let (id, target_keys) = self.prepare_target(model)?;

            if known.contains(&id) {
                stale.retain(|existing| existing != &id);
                if let Some(order) = &self.key_through_order {
                    let mut update = Query::update();
                    update
                        .table(table(&self.table_through))
                        .value(iden(order), Expr::val(position as i64));
                    for (column, value) in source_keys.iter().chain(&target_keys) {
                        update.and_where(Predicate::value_eq(column.as_str(), value.clone()).to_expr());
                    }
                    let (sql, values) = update.build(PostgresQueryBuilder);
                    self.execute(&*executor, &sql, &values)?;
                }
            } else {
                log::debug!("{}: linking {}", self.name, id);
                let mut columns: Vec<&str> = Vec::new();
                let mut row: Vec<Expr> = Vec::new();
                for (column, value) in source_keys.iter().chain(&target_keys) {
                    columns.push(column);
                    row.push(Expr::val(value.clone()));
                }
                if let Some(order) = &self.key_through_order {
                    columns.push(order);
                    row.push(Expr::val(position as i64));
                }

                let mut insert = Query::insert();
                insert
                    .into_table(table(&self.table_through))
                    .columns(columns.into_iter().map(iden));
                insert.values(row).map_err(|e| {
                    RelationError::configuration(self.name.as_str(), format!("invalid through row: {}", e))
                })?;
                let (sql, values) = insert.build(PostgresQueryBuilder);
                self.execute(&*executor, &sql, &values)?;
                known.push(id.clone());
            }

            if *key != id {
                rekeyed.push((key.as_str().to_string(), id, Rc::clone(model)));
            }
        }

        for id in &stale {
            if id.values().len() != self.keys.key_through_to().len() {
                return Err(RelationError::configuration(
                    self.name.as_str(),
                    format!(
                        "link identifier {} has {} components, expected {}",
                        id,
                        id.values().len(),
                        self.keys.key_through_to().len()
                    ),
                ));
            }
            log::debug!("{}: unlinking {}", self.name, id);
            let target_keys: Vec<(String, Value)> = self
                .keys
                .key_through_to()
                .iter()
                .cloned()
                .zip(id.values().iter().cloned())
                .collect();
            let (sql, values) = self
                .through_delete(source_keys.iter().chain(&target_keys))
                .build(PostgresQueryBuilder);
            self.execute(&*executor, &sql, &values)?;
        }

        if !rekeyed.is_empty() {
            self.rekey_cache(source, rekeyed);
        }

        if cascade.unwrap_or(self.cascade_save) && !links.is_empty() {
            for model in links.models() {
                model
                    .try_borrow_mut()
                    .map_err(|_| RelationError::model(self.model_to.as_str(), "model is already borrowed"))?
                    .save(None)?;
            }
        }
        Ok(())
    }

    /// Type-check a desired target, save it if new, and compute its link identifier
    /// and through-table key values
    fn prepare_target(&self, model: &ModelRef) -> Result<(LinkId, Vec<(String, Value)>)> {
        let mut target = model
            .try_borrow_mut()
            .map_err(|_| RelationError::model(self.model_to.as_str(), "model is already borrowed"))?;
        if target.model_name() != self.model_to {
            return Err(RelationError::configuration(
                self.name.as_str(),
                format!(
                    "invalid model instance {}, expected {}",
                    target.model_name(),
                    self.model_to
                ),
            ));
        }
        if target.is_new() {
            target.save(Some(false))?;
        }
        let target_keys = self.keys.target_values(&self.name, &*target)?.ok_or_else(|| {
            RelationError::configuration(
                self.name.as_str(),
                format!("{} model has no key value after saving", target.model_name()),
            )
        })?;
        let id = LinkId::from_values(target_keys.iter().map(|(_, value)| value.clone()).collect());
        Ok((id, target_keys))
    }

    /// Store re-keyed entries in the source's relation cache under their link identifiers
    fn rekey_cache(&self, source: &mut dyn Model, rekeyed: Vec<(String, LinkId, ModelRef)>) {
        let mut cache = source
            .related(&self.name)
            .and_then(Related::as_many)
            .cloned()
            .unwrap_or_default();
        for (key, id, model) in rekeyed {
            if cache.get(&key).is_some_and(|cached| Rc::ptr_eq(cached, &model)) {
                cache.remove(&key);
            }
            cache.insert(id, model);
        }
        source.replace_related(&self.name, Related::Many(cache));
    }

    /// `DELETE FROM through WHERE column = value AND ...`
    pub(crate) fn through_delete<'a>(&self, filters: impl Iterator<Item = &'a (String, Value)>) -> DeleteStatement {
        let mut delete = Query::delete();
        delete.from_table(table(&self.table_through));
        for (column, value) in filters {
            delete.and_where(Predicate::value_eq(column.as_str(), value.clone()).to_expr());
        }
        delete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelationConfig;
    use crate::model::{model_ref, ModelRegistry};
    use crate::executor::Row;
    use crate::naming::DefaultNaming;
    use crate::query::ConditionBag;
    use crate::test_helpers::{MemoryModel, MemoryModelType, RecordingExecutor};
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

    fn tag(id: i64) -> ModelRef {
        model_ref(MemoryModel::new("Tag").with("id", id).persisted())
    }

    fn ids(ids: &[i64]) -> Vec<LinkId> {
        ids.iter().map(|id| LinkId::from_values(vec![Value::BigInt(Some(*id))])).collect()
    }

    #[test]
    fn test_skips_when_parent_not_saved() {
        let (relation, executor) = post_tags(RelationConfig::new());
        let mut post = MemoryModel::new("Post").with("id", 1i64);
        let desired = Related::from(LinkMap::new().with("1", tag(1)));

        assert!(relation.save(&mut post, desired, &[], false, None).is_ok());
        assert!(executor.statements().is_empty());
    }

    #[test]
    fn test_inserts_new_links_and_deletes_stale() {
        let (relation, executor) = post_tags(RelationConfig::new().cascade_save(false));
        let mut post = MemoryModel::new("Post").with("id", 1i64);
        let desired = Related::from(LinkMap::new().with("2", tag(2)).with("4", tag(4)));

        relation.save(&mut post, desired, &ids(&[1, 2]), true, None).unwrap();

        let sql: Vec<String> = executor.statements().into_iter().map(|(sql, _)| sql).collect();
        assert_eq!(
            sql,
            vec![
                r#"INSERT INTO "post_tag" ("post_id", "tag_id") VALUES ($1, $2)"#.to_string(),
                r#"DELETE FROM "post_tag" WHERE "post_id" = $1 AND "tag_id" = $2"#.to_string(),
            ]
        );
        let values: Vec<Vec<Value>> = executor.statements().into_iter().map(|(_, v)| v.0).collect();
        assert_eq!(values[0], vec![Value::BigInt(Some(1)), Value::BigInt(Some(4))]);
        assert_eq!(values[1], vec![Value::BigInt(Some(1)), Value::BigInt(Some(1))]);
    }

    #[test]
    fn test_order_column_written_and_refreshed() {
        let (relation, executor) = post_tags(RelationConfig::new().key_through_order("position").cascade_save(false));
        let mut post = MemoryModel::new("Post").with("id", 1i64);
        let desired = Related::from(LinkMap::new().with("5", tag(5)).with("2", tag(2)));

        relation.save(&mut post, desired, &ids(&[2]), true, None).unwrap();

        let statements = executor.statements();
        assert_eq!(
            statements[0].0,
            r#"INSERT INTO "post_tag" ("post_id", "tag_id", "position") VALUES ($1, $2, $3)"#
        );
        assert_eq!(
            statements[0].1 .0,
            vec![Value::BigInt(Some(1)), Value::BigInt(Some(5)), Value::BigInt(Some(0))]
        );
        assert_eq!(
            statements[1].0,
            r#"UPDATE "post_tag" SET "position" = $1 WHERE "post_id" = $2 AND "tag_id" = $3"#
        );
        assert_eq!(statements[1].1 .0[0], Value::BigInt(Some(1)));
    }

    #[test]
    fn test_rejects_single_model() {
        let (relation, executor) = post_tags(RelationConfig::new());
        let mut post = MemoryModel::new("Post").with("id", 1i64);

        let err = relation.save(&mut post, Related::One(tag(1)), &[], true, None).unwrap_err();
        assert!(err.is_configuration());
        assert!(executor.statements().is_empty());
    }

    #[test]
    fn test_rejects_wrong_model_type() {
        let (relation, _) = post_tags(RelationConfig::new());
        let mut post = MemoryModel::new("Post").with("id", 1i64);
        let user = model_ref(MemoryModel::new("User").with("id", 3i64).persisted());

        let message = relation
            .save(&mut post, Related::from(LinkMap::new().with("3", user)), &[], true, None)
            .unwrap_err()
            .to_string();
        assert!(message.contains("User"));
        assert!(message.contains("Tag"));
    }

    #[test]
    fn test_new_target_saved_without_cascade_then_rekeyed() {
        let (relation, _) = post_tags(RelationConfig::new().cascade_save(false));
        let mut post = MemoryModel::new("Post").with("id", 1i64);
        let fresh = MemoryModel::new("Tag").with("name", "new").assigns_id(12);
        let journal = fresh.journal();
        let fresh = model_ref(fresh);
        post.replace_related("tags", Related::from(LinkMap::new().with("draft", fresh.clone())));

        let desired = Related::from(LinkMap::new().with("draft", fresh.clone()));
        relation.save(&mut post, desired, &[], true, None).unwrap();

        assert_eq!(journal.events(), vec!["save Tag cascade=Some(false)".to_string()]);
        let cache = post.related("tags").and_then(Related::as_many).unwrap();
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["12"]);
        assert!(cache.get("12").is_some_and(|m| Rc::ptr_eq(m, &fresh)));
    }

    #[test]
    fn test_cascade_override() {
        let (relation, _) = post_tags(RelationConfig::new());
        let mut post = MemoryModel::new("Post").with("id", 1i64);
        let target = MemoryModel::new("Tag").with("id", 1i64).persisted();
        let journal = target.journal();
        let desired = Related::from(LinkMap::new().with("1", model_ref(target)));

        assert!(relation.save(&mut post, desired.clone(), &[], true, Some(false)).is_ok());
        assert!(journal.events().is_empty());

        assert!(relation.save(&mut post, desired, &ids(&[1]), true, None).is_ok());
        assert_eq!(journal.events(), vec!["save Tag cascade=None".to_string()]);
    }

    #[test]
    fn test_null_source_key_is_configuration_error() {
        let (relation, executor) = post_tags(RelationConfig::new());
        let mut post = MemoryModel::new("Post").with("id", Value::BigInt(None));

        let err = relation.save(&mut post, Related::None, &[], true, None).unwrap_err();
        assert!(err.is_configuration());
        assert!(executor.statements().is_empty());
    }

    #[test]
    fn test_string_keys_are_deleted_verbatim() {
        // EDGE CASE: a VARCHAR key such as "007" must be bound as the same string
        let executor = Arc::new(RecordingExecutor::new());
        let mut registry = ModelRegistry::new();
        registry.register(Arc::new(MemoryModelType::new("Post", "posts", executor.clone())));
        registry.register(Arc::new(MemoryModelType::new("Tag", "tags", executor.clone())));
        let config = RelationConfig::new()
            .table_through("post_tag")
            .key_through_from(["post_id"])
            .key_to(["code"])
            .key_through_to(["tag_code"]);
        let relation = ManyMany::new("Post", "tags", &config, &registry, &DefaultNaming).unwrap();
        let post = MemoryModel::new("Post").with("id", 1i64).persisted();

        executor.push_rows(vec![
            Row::new().with("code", "007"),
            Row::new().with("code", "123"),
        ]);
        let fetched = relation.get(&post, &ConditionBag::new()).unwrap();
        let original = fetched.link_ids("tags", 1).unwrap();
        executor.clear();

        let mut post = post;
        relation.save(&mut post, Related::None, &original, true, None).unwrap();

        let statements = executor.statements();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0].0,
            r#"DELETE FROM "post_tag" WHERE "post_id" = $1 AND "tag_code" = $2"#
        );
        assert_eq!(
            statements[0].1 .0,
            vec![Value::BigInt(Some(1)), Value::String(Some("007".to_string()))]
        );
        assert_eq!(statements[1].1 .0[1], Value::String(Some("123".to_string())));
    }

    #[test]
    fn test_decoded_string_key_is_not_coerced() {
        let (relation, executor) = post_tags(RelationConfig::new().key_to(["code"]).key_through_to(["tag_code"]));
        let mut post = MemoryModel::new("Post").with("id", 1i64);
        let original = vec![LinkId::parse("tags", "007", 1).unwrap()];

        relation.save(&mut post, Related::None, &original, true, None).unwrap();

        let statements = executor.statements();
        assert_eq!(
            statements[0].1 .0,
            vec![Value::BigInt(Some(1)), Value::String(Some("007".to_string()))]
        );
    }
}
