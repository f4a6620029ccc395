//! Through-table key mapping.
//!
//! The `KeyMap` pairs each side's key columns with the through table's
//! foreign-key columns by position. Names never matter: `key_from[i]` always
//! corresponds to `key_through_from[i]`, and `key_to[i]` to `key_through_to[i]`.

use crate::error::{RelationError, Result};
use crate::model::Model;
use crate::value::is_null;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_query::Value;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Check that `name` is a plain SQL identifier
///
/// # Errors
///
/// Returns `RelationError::Configuration` naming the relation and the identifier.
pub fn validate_identifier(relation: &str, what: &str, name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(RelationError::configuration(
            relation,
            format!("invalid {} identifier: {:?}", what, name),
        ))
    }
}

/// Positional key correspondence between source, target and through table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap {
    key_from: Vec<String>,
    key_through_from: Vec<String>,
    key_to: Vec<String>,
    key_through_to: Vec<String>,
}

impl KeyMap {
    /// Build a key map, validating arities and identifiers
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` if a list is empty, paired lists
    /// differ in length, or a column name is not a plain identifier.
    pub fn new(
        relation: &str,
        key_from: Vec<String>,
        key_through_from: Vec<String>,
        key_to: Vec<String>,
        key_through_to: Vec<String>,
    ) -> Result<Self> {
        for (what, keys) in [
            ("key_from", &key_from),
            ("key_through_from", &key_through_from),
            ("key_to", &key_to),
            ("key_through_to", &key_through_to),
        ] {
            if keys.is_empty() {
                return Err(RelationError::configuration(relation, format!("{} must not be empty", what)));
            }
            for key in keys {
                validate_identifier(relation, what, key)?;
            }
        }
        if key_from.len() != key_through_from.len() {
            return Err(RelationError::configuration(
                relation,
                format!(
                    "key_from has {} columns but key_through_from has {}",
                    key_from.len(),
                    key_through_from.len()
                ),
            ));
        }
        if key_to.len() != key_through_to.len() {
            return Err(RelationError::configuration(
                relation,
                format!(
                    "key_to has {} columns but key_through_to has {}",
                    key_to.len(),
                    key_through_to.len()
                ),
            ));
        }
        Ok(Self {
            key_from,
            key_through_from,
            key_to,
            key_through_to,
        })
    }

    pub fn key_from(&self) -> &[String] {
        &self.key_from
    }

    pub fn key_through_from(&self) -> &[String] {
        &self.key_through_from
    }

    pub fn key_to(&self) -> &[String] {
        &self.key_to
    }

    pub fn key_through_to(&self) -> &[String] {
        &self.key_through_to
    }

    /// `(key_from[i], key_through_from[i])` pairs
    pub fn source_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.key_from
            .iter()
            .zip(&self.key_through_from)
            .map(|(key, through)| (key.as_str(), through.as_str()))
    }

    /// `(key_to[i], key_through_to[i])` pairs
    pub fn target_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.key_to
            .iter()
            .zip(&self.key_through_to)
            .map(|(key, through)| (key.as_str(), through.as_str()))
    }

    /// Through-table column and value for every source key.
    ///
    /// Returns `Ok(None)` as soon as a source key holds NULL.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` if the model has no such field.
    pub fn source_values(&self, relation: &str, source: &dyn Model) -> Result<Option<Vec<(String, Value)>>> {
        collect_values(relation, source, self.source_pairs())
    }

    /// Through-table column and value for every target key; `Ok(None)` on NULL
    pub fn target_values(&self, relation: &str, target: &dyn Model) -> Result<Option<Vec<(String, Value)>>> {
        collect_values(relation, target, self.target_pairs())
    }

    /// Target key values in `key_to` order; `Ok(None)` on NULL
    pub fn target_key(&self, relation: &str, target: &dyn Model) -> Result<Option<Vec<Value>>> {
        Ok(self
            .target_values(relation, target)?
            .map(|pairs| pairs.into_iter().map(|(_, value)| value).collect()))
    }
}

fn collect_values<'a>(
    relation: &str,
    model: &dyn Model,
    pairs: impl Iterator<Item = (&'a str, &'a str)>,
) -> Result<Option<Vec<(String, Value)>>> {
    let mut values = Vec::new();
    for (key, through) in pairs {
        let value = model.get(key).ok_or_else(|| {
            RelationError::configuration(
                relation,
                format!("model {} has no field {}", model.model_name(), key),
            )
        })?;
        if is_null(&value) {
            return Ok(None);
        }
        values.push((through.to_string(), value));
    }
    Ok(Some(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MemoryModel;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn composite() -> KeyMap {
        KeyMap::new(
            "members",
            strings(&["org", "num"]),
            strings(&["member_org", "member_num"]),
            strings(&["id"]),
            strings(&["group_id"]),
        )
        .unwrap()
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("tags", "key_from", "post_id").is_ok());
        assert!(validate_identifier("tags", "key_from", "_x1").is_ok());
        assert!(validate_identifier("tags", "key_from", "1abc").is_err());
        assert!(validate_identifier("tags", "key_from", "id; DROP TABLE x").is_err());
        assert!(validate_identifier("tags", "key_from", "").is_err());
    }

    #[test]
    fn test_rejects_arity_mismatch() {
        let message = KeyMap::new(
            "tags",
            strings(&["id", "lang"]),
            strings(&["post_id"]),
            strings(&["id"]),
            strings(&["tag_id"]),
        )
        .unwrap_err()
        .to_string();
        assert!(message.contains("tags"));
        assert!(message.contains("key_through_from has 1"));
    }

    #[test]
    fn test_rejects_empty_keys() {
        let err = KeyMap::new("tags", vec![], vec![], strings(&["id"]), strings(&["tag_id"]));
        assert!(err.is_err());
    }

    #[test]
    fn test_pairs_are_positional() {
        let keys = composite();
        let pairs: Vec<_> = keys.source_pairs().collect();
        assert_eq!(pairs, vec![("org", "member_org"), ("num", "member_num")]);
    }

    #[test]
    fn test_source_values_follow_positions() {
        let keys = composite();
        let source = MemoryModel::new("Member").with("num", 3i64).with("org", 7i64);

        let values = keys.source_values("members", &source).unwrap();
        assert_eq!(
            values,
            Some(vec![
                ("member_org".to_string(), Value::BigInt(Some(7))),
                ("member_num".to_string(), Value::BigInt(Some(3))),
            ])
        );
    }

    #[test]
    fn test_null_key_yields_none() {
        let keys = composite();
        let source = MemoryModel::new("Member").with("org", 7i64).with("num", Value::BigInt(None));
        assert_eq!(keys.source_values("members", &source).unwrap(), None);
    }

    #[test]
    fn test_missing_field_is_configuration_error() {
        let keys = composite();
        let source = MemoryModel::new("Member").with("org", 7i64);
        let err = keys.source_values("members", &source).unwrap_err();
        assert!(err.is_configuration());
    }
}
