//! Relation configuration.
//!
//! Relations are declared per model under the `resolver` section:
//!
//! ```toml
//! [resolver.relations.post.tags]
//! model_to = "tag"
//! table_through = "post_tag"
//! key_through_from = "post_id"
//! key_through_to = "tag_id"
//! key_through_order = "position"
//!
//! [resolver.relations.post.tags.conditions]
//! where = [["status", "=", "published"]]
//! order_by = [["name", "asc"]]
//! ```
//!
//! Key options take a single column or a list of columns.

use crate::query::condition::ConditionBag;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

const CONFIG_FILE: &str = "config/config.toml";
const ENV_PREFIX: &str = "THROUGHWAY";

/// Options of one many-to-many relation; unset options use naming conventions
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelationConfig {
    pub model_to: Option<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub key_from: Option<Vec<String>>,
    #[serde(deserialize_with = "string_or_list")]
    pub key_to: Option<Vec<String>>,
    pub table_through: Option<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub key_through_from: Option<Vec<String>>,
    #[serde(deserialize_with = "string_or_list")]
    pub key_through_to: Option<Vec<String>>,
    pub key_through_order: Option<String>,
    pub conditions: ConditionBag,
    pub cascade_save: Option<bool>,
    pub cascade_delete: Option<bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Columns {
    One(String),
    Many(Vec<String>),
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Columns>::deserialize(deserializer)?.map(|columns| match columns {
        Columns::One(column) => vec![column],
        Columns::Many(columns) => columns,
    }))
}

fn strings<I, S>(columns: I) -> Option<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Some(columns.into_iter().map(Into::into).collect())
}

impl RelationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model_to(mut self, model: impl Into<String>) -> Self {
        self.model_to = Some(model.into());
        self
    }

    pub fn key_from<I: IntoIterator<Item = S>, S: Into<String>>(mut self, columns: I) -> Self {
        self.key_from = strings(columns);
        self
    }

    pub fn key_to<I: IntoIterator<Item = S>, S: Into<String>>(mut self, columns: I) -> Self {
        self.key_to = strings(columns);
        self
    }

    pub fn table_through(mut self, table: impl Into<String>) -> Self {
        self.table_through = Some(table.into());
        self
    }

    pub fn key_through_from<I: IntoIterator<Item = S>, S: Into<String>>(mut self, columns: I) -> Self {
        self.key_through_from = strings(columns);
        self
    }

    pub fn key_through_to<I: IntoIterator<Item = S>, S: Into<String>>(mut self, columns: I) -> Self {
        self.key_through_to = strings(columns);
        self
    }

    pub fn key_through_order(mut self, column: impl Into<String>) -> Self {
        self.key_through_order = Some(column.into());
        self
    }

    pub fn conditions(mut self, conditions: ConditionBag) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn cascade_save(mut self, cascade: bool) -> Self {
        self.cascade_save = Some(cascade);
        self
    }

    pub fn cascade_delete(mut self, cascade: bool) -> Self {
        self.cascade_delete = Some(cascade);
        self
    }
}

/// Relation declarations for every model: `relations[model][relation]`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub relations: BTreeMap<String, BTreeMap<String, RelationConfig>>,
}

impl ResolverConfig {
    /// Load the resolver configuration from `config/config.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // Unreadable file: retry with the environment alone
                if std::path::Path::new(CONFIG_FILE).exists() {
                    log::warn!("failed to load {}, falling back to env: {}", CONFIG_FILE, err);
                }
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {}, then env-only error: {}",
                            err, env_err
                        ))
                    })?
            }
        };
        Self::from_settings(&settings)
    }

    /// Parse a TOML document holding a `resolver` section
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Self::from_settings(&settings)
    }

    fn from_settings(settings: &Config) -> Result<Self, ConfigError> {
        match settings.get::<ResolverConfig>("resolver") {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => {
                log::warn!("no resolver section configured, no relations declared");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Message(format!(
                "Resolver configuration could not be loaded from file or environment: {}",
                e
            ))),
        }
    }

    /// Options of `relation` on `model`
    pub fn relation(&self, model: &str, relation: &str) -> Option<&RelationConfig> {
        self.relations.get(model).and_then(|relations| relations.get(relation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::condition::{ConditionEntry, Direction, JoinKind, Operator, OrderEntry};
    use sea_query::Value;

    #[test]
    fn test_from_toml_str() {
        let config = ResolverConfig::from_toml_str(
            r#"
            [resolver.relations.post.tags]
            model_to = "tag"
            table_through = "post_tag"
            key_through_from = "post_id"
            key_through_to = ["tag_id"]
            key_through_order = "position"
            cascade_delete = true

            [resolver.relations.post.tags.conditions]
            where = [["status", "=", "published"]]
            order_by = [["name", "desc"]]
            join_type = "inner"
            "#,
        )
        .unwrap();

        let tags = config.relation("post", "tags").expect("post.tags is configured");
        assert_eq!(tags.model_to.as_deref(), Some("tag"));
        assert_eq!(tags.table_through.as_deref(), Some("post_tag"));
        assert_eq!(tags.key_through_from, Some(vec!["post_id".to_string()]));
        assert_eq!(tags.key_through_to, Some(vec!["tag_id".to_string()]));
        assert_eq!(tags.key_from, None);
        assert_eq!(tags.cascade_save, None);
        assert_eq!(tags.cascade_delete, Some(true));
        assert_eq!(
            tags.conditions,
            ConditionBag::new()
                .with_where(ConditionEntry::clause("status", Operator::Eq, Value::from("published")))
                .with_order_by(OrderEntry::field("name", Direction::Desc))
                .with_join_type(JoinKind::Inner)
        );
    }

    #[test]
    fn test_missing_section_is_empty() {
        let config = ResolverConfig::from_toml_str("[database]\nurl = \"postgres://localhost\"\n");
        assert_eq!(config.unwrap(), ResolverConfig::default());
    }

    #[test]
    fn test_invalid_conditions_rejected() {
        let config = ResolverConfig::from_toml_str(
            r#"
            [resolver.relations.post.tags.conditions]
            where = [["status", "~~", "published"]]
            "#,
        );
        assert!(config.is_err());
    }

    #[test]
    fn test_builder() {
        let config = RelationConfig::new()
            .key_from(["org", "num"])
            .key_through_from(vec!["member_org".to_string(), "member_num".to_string()])
            .cascade_save(false);

        assert_eq!(config.key_from, Some(vec!["org".to_string(), "num".to_string()]));
        assert_eq!(config.key_through_from.as_ref().map(Vec::len), Some(2));
        assert_eq!(config.cascade_save, Some(false));
    }
}
