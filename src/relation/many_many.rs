//! Many-to-many relation through an association table.
//!
//! `ManyMany` is built once per (model, relation name) from a
//! [`RelationConfig`]. It is immutable afterwards: every `get` and `join`
//! builds its own [`QueryContext`], so one descriptor can serve concurrent
//! callers.
//!
//! Persistence (`save`, `delete`) lives in the `sync` and `unlink` modules.

use crate::config::RelationConfig;
use crate::error::{RelationError, Result};
use crate::executor::Executor;
use crate::model::{Model, ModelRegistry, ModelType};
use crate::naming::Naming;
use crate::query::condition::{ConditionBag, Direction, JoinKind, OrderEntry, Predicate};
use crate::query::select::RelatedQuery;
use crate::relation::context::{FieldAliaser, QueryContext};
use crate::relation::filter::ConditionBuilder;
use crate::relation::join::{JoinDescriptor, JoinPlan};
use crate::relation::keys::{validate_identifier, KeyMap};
use crate::relation::links::{LinkId, LinkMap};
use sea_query::Values;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// Many-to-many relation descriptor
pub struct ManyMany {
    pub(crate) name: String,
    pub(crate) model_from: String,
    pub(crate) model_to: String,
    pub(crate) table_through: String,
    pub(crate) keys: KeyMap,
    pub(crate) key_through_order: Option<String>,
    pub(crate) conditions: ConditionBag,
    pub(crate) cascade_save: bool,
    pub(crate) cascade_delete: bool,
    pub(crate) source_type: Arc<dyn ModelType>,
    pub(crate) target_type: Arc<dyn ModelType>,
    aliaser: FieldAliaser,
}

fn configured(values: &Option<Vec<String>>) -> Option<Vec<String>> {
    values.as_ref().filter(|v| !v.is_empty()).cloned()
}

impl ManyMany {
    /// Build the relation `name` declared on `model_from`
    ///
    /// Unset options fall back to conventions:
    ///
    /// - `model_to`: the source's namespace plus the classified relation name
    /// - `key_from`, `key_to`: `["id"]`
    /// - `table_through`: both model names sorted case-insensitively, each
    ///   tableized, joined with `_`
    /// - `key_through_from`, `key_through_to`: foreign key of each model
    /// - `cascade_save`: true, `cascade_delete`: false
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` if either model type is not
    /// registered or the key configuration is invalid.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use throughway::config::RelationConfig;
    /// use throughway::model::ModelRegistry;
    /// use throughway::naming::DefaultNaming;
    /// use throughway::relation::ManyMany;
    ///
    /// # fn example(registry: &ModelRegistry) -> Result<(), throughway::RelationError> {
    /// let config = RelationConfig::new()
    ///     .table_through("post_tag")
    ///     .key_through_from(["post_id"])
    ///     .key_through_to(["tag_id"]);
    /// let tags = ManyMany::new("Post", "tags", &config, registry, &DefaultNaming)?;
    /// assert_eq!(tags.model_to(), "Tag");
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        model_from: &str,
        name: &str,
        config: &RelationConfig,
        registry: &ModelRegistry,
        naming: &dyn Naming,
    ) -> Result<Self> {
        let model_to = config
            .model_to
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| naming.model_name(model_from, name));
        let source_type = registry.resolve(model_from).ok_or_else(|| {
            RelationError::configuration(name, format!("source model not found: {}", model_from))
        })?;
        let target_type = registry.require(name, &model_to)?;

        let table_through = match config.table_through.as_deref().filter(|t| !t.is_empty()) {
            Some(table) => table.to_string(),
            None => {
                let mut models = [model_from, model_to.as_str()];
                models.sort_by_key(|model| model.to_lowercase());
                format!("{}_{}", naming.table_name(models[0]), naming.table_name(models[1]))
            }
        };
        validate_identifier(name, "table_through", &table_through)?;

        let keys = KeyMap::new(
            name,
            configured(&config.key_from).unwrap_or_else(|| vec!["id".to_string()]),
            configured(&config.key_through_from).unwrap_or_else(|| vec![naming.foreign_key(model_from)]),
            configured(&config.key_to).unwrap_or_else(|| vec!["id".to_string()]),
            configured(&config.key_through_to).unwrap_or_else(|| vec![naming.foreign_key(&model_to)]),
        )?;

        let key_through_order = config.key_through_order.clone().filter(|k| !k.is_empty());
        if let Some(order) = &key_through_order {
            validate_identifier(name, "key_through_order", order)?;
        }

        let aliaser = FieldAliaser::new(
            name,
            &table_through,
            target_type.table_name(),
            source_type.table_name(),
        )?;

        log::debug!(
            "Registered many-to-many {}.{} -> {} through {}",
            model_from,
            name,
            model_to,
            table_through
        );

        Ok(Self {
            name: name.to_string(),
            model_from: model_from.to_string(),
            model_to,
            table_through,
            keys,
            key_through_order,
            conditions: config.conditions.clone(),
            cascade_save: config.cascade_save.unwrap_or(true),
            cascade_delete: config.cascade_delete.unwrap_or(false),
            source_type,
            target_type,
            aliaser,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model_from(&self) -> &str {
        &self.model_from
    }

    pub fn model_to(&self) -> &str {
        &self.model_to
    }

    pub fn table_through(&self) -> &str {
        &self.table_through
    }

    pub fn keys(&self) -> &KeyMap {
        &self.keys
    }

    pub fn key_through_order(&self) -> Option<&str> {
        self.key_through_order.as_deref()
    }

    /// Static conditions from configuration
    pub fn conditions(&self) -> &ConditionBag {
        &self.conditions
    }

    pub fn cascade_save(&self) -> bool {
        self.cascade_save
    }

    pub fn cascade_delete(&self) -> bool {
        self.cascade_delete
    }

    /// Through-table columns to select under `alias`: target keys, then source keys
    pub fn select_through(&self, alias: &str) -> Vec<String> {
        self.keys
            .key_through_to()
            .iter()
            .chain(self.keys.key_through_from())
            .map(|key| format!("{}.{}", alias, key))
            .collect()
    }

    /// Target columns to select under `alias`
    fn select_target(&self, alias: &str) -> Vec<String> {
        let columns = self.target_type.columns();
        if columns.is_empty() {
            vec![format!("{}.*", alias)]
        } else {
            columns.iter().map(|column| format!("{}.{}", alias, column)).collect()
        }
    }

    fn through_descriptor(&self, ctx: &QueryContext, join_type: JoinKind, join_on: Vec<Predicate>) -> JoinDescriptor {
        JoinDescriptor {
            model: None,
            table: self.table_through.clone(),
            alias: ctx.alias_through.clone(),
            primary_key: Vec::new(),
            join_type,
            join_on,
            columns: self.select_through(&ctx.alias_through),
            rel_name: None,
            order_by: Vec::new(),
        }
    }

    /// `through.key_through_to[i] = target.key_to[i]` for every key position
    fn target_join_keys(&self, ctx: &QueryContext) -> Vec<Predicate> {
        self.keys
            .target_pairs()
            .map(|(key, through)| {
                Predicate::columns_eq(
                    format!("{}.{}", ctx.alias_through, through),
                    format!("{}.{}", ctx.alias_to, key),
                )
            })
            .collect()
    }

    fn order_entries(&self, builder: &ConditionBuilder<'_>, merged: &ConditionBag, ctx: &QueryContext) -> Vec<OrderEntry> {
        match (&self.key_through_order, merged.order_by.is_empty()) {
            (Some(order), true) => vec![OrderEntry::field(
                format!("{}.{}", ctx.alias_through, order),
                Direction::Asc,
            )],
            _ => builder.order(&merged.order_by, &ctx.alias_to),
        }
    }

    /// Build the fetch query for `source` without running it.
    ///
    /// Returns `Ok(None)` if the source model has a NULL key: an unsaved model
    /// has no persisted links.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` for invalid conditions or a
    /// missing source field.
    pub fn fetch_query(&self, source: &dyn Model, conditions: &ConditionBag) -> Result<Option<RelatedQuery>> {
        let ctx = QueryContext::fetch();
        let merged = self.conditions.merge(conditions);
        let builder = ConditionBuilder::new(&self.name, &self.aliaser, &ctx);

        let source_filter = match builder.source_filter(&self.keys, source)? {
            Some(filter) => filter,
            None => {
                log::debug!("{}: source {} has no key value, nothing to fetch", self.name, source.model_name());
                return Ok(None);
            }
        };

        let mut join_on = self.target_join_keys(&ctx);
        join_on.extend(builder.predicates(&merged.join_on, &ctx.alias_through)?);
        let through = self.through_descriptor(&ctx, JoinKind::Inner, join_on);

        let mut query = RelatedQuery::new(Arc::clone(&self.target_type), &ctx.alias_to).join(&through);
        for predicate in &source_filter {
            query = query.filter(predicate);
        }
        for predicate in &builder.predicates(&merged.through_where, &ctx.alias_through)? {
            query = query.filter(predicate);
        }
        for predicate in &builder.where_predicates(&merged.where_, Some(source))? {
            query = query.filter(predicate);
        }
        for entry in &self.order_entries(&builder, &merged, &ctx) {
            query = query.order_by(entry);
        }
        Ok(Some(query))
    }

    /// Fetch the models linked to `source`, keyed by their link identifiers
    ///
    /// Runs on the target model type's connection. A source with a NULL key
    /// yields an empty set without querying.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` for invalid conditions,
    /// `RelationError::Storage` if the query fails and `RelationError::Model`
    /// if a row cannot be hydrated.
    pub fn get(&self, source: &dyn Model, conditions: &ConditionBag) -> Result<LinkMap> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::relation_span("get", &self.name).entered();

        let query = match self.fetch_query(source, conditions)? {
            Some(query) => query,
            None => return Ok(LinkMap::new()),
        };

        let mut links = LinkMap::new();
        for model in query.all()? {
            let id = {
                let target = model
                    .try_borrow()
                    .map_err(|_| RelationError::model(self.model_to.as_str(), "model is already mutably borrowed"))?;
                self.link_id(&*target)?
            };
            links.insert(id, model);
        }
        log::debug!("{}: fetched {} linked model(s)", self.name, links.len());
        Ok(links)
    }

    /// Join descriptors embedding this relation in a parent query.
    ///
    /// The through table is anchored on `alias_from`; the target gets alias
    /// `t{alias_to_nr}` and the through table `t{alias_to_nr}_through`. The
    /// returned plan holds `{rel_name}_through` and `{rel_name}`, both left
    /// joins unless `join_type` says otherwise.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` for invalid conditions.
    pub fn join(
        &self,
        alias_from: &str,
        rel_name: &str,
        alias_to_nr: usize,
        conditions: &ConditionBag,
    ) -> Result<JoinPlan> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::relation_span("join", &self.name).entered();

        let ctx = QueryContext::nested(alias_from, alias_to_nr);
        let merged = self.conditions.merge(conditions);
        let builder = ConditionBuilder::new(&self.name, &self.aliaser, &ctx);
        let join_type = merged.join_type.unwrap_or(JoinKind::Left);

        let mut through_on: Vec<Predicate> = self
            .keys
            .source_pairs()
            .map(|(key, through)| {
                Predicate::columns_eq(
                    format!("{}.{}", alias_from, key),
                    format!("{}.{}", ctx.alias_through, through),
                )
            })
            .collect();
        through_on.extend(builder.predicates(&merged.through_where, &ctx.alias_through)?);

        let mut target_on = self.target_join_keys(&ctx);
        target_on.extend(builder.where_predicates(&merged.where_, None)?);
        target_on.extend(builder.predicates(&merged.join_on, &ctx.alias_through)?);

        let target = JoinDescriptor {
            model: Some(self.model_to.clone()),
            table: self.target_type.table_name().to_string(),
            alias: ctx.alias_to.clone(),
            primary_key: self.target_type.primary_key().to_vec(),
            join_type,
            join_on: target_on,
            columns: self.select_target(&ctx.alias_to),
            rel_name: Some(rel_name.rsplit('.').next().unwrap_or(rel_name).to_string()),
            order_by: self.order_entries(&builder, &merged, &ctx),
        };

        let mut plan = JoinPlan::new();
        plan.push(
            format!("{}_through", rel_name),
            self.through_descriptor(&ctx, join_type, through_on),
        );
        plan.push(rel_name, target);
        Ok(plan)
    }

    /// Link identifier of a target model, from its `key_to` values
    pub(crate) fn link_id(&self, target: &dyn Model) -> Result<LinkId> {
        self.keys
            .target_key(&self.name, target)?
            .map(LinkId::from_values)
            .ok_or_else(|| {
                RelationError::configuration(
                    self.name.as_str(),
                    format!("{} model has no key value", target.model_name()),
                )
            })
    }

    /// Run a built statement, logging it first
    pub(crate) fn execute(&self, executor: &dyn Executor, sql: &str, values: &Values) -> Result<u64> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(sql).entered();

        log::debug!("{}: {} [{} bound]", self.name, sql, values.0.len());
        Ok(executor.execute(sql, values)?)
    }
}

impl std::fmt::Debug for ManyMany {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManyMany")
            .field("name", &self.name)
            .field("model_from", &self.model_from)
            .field("model_to", &self.model_to)
            .field("table_through", &self.table_through)
            .field("keys", &self.keys)
            .field("key_through_order", &self.key_through_order)
            .field("conditions", &self.conditions)
            .field("cascade_save", &self.cascade_save)
            .field("cascade_delete", &self.cascade_delete)
            .finish()
    }
}
