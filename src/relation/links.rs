//! Link identifiers and link sets.
//!
//! A [`LinkId`] is the canonical identifier of a target model, built from its
//! key values. Single keys use the raw value (`7`); composite keys wrap every
//! value in brackets (`[7][3]`). The encoded string is what gets compared,
//! while the typed key values travel with it so deletes bind them as-is.
//!
//! A [`LinkMap`] is an ordered mapping from a link key to a model, used both
//! for fetched relation sets and for the desired state handed to `save`.

use crate::error::{RelationError, Result};
use crate::model::ModelRef;
use crate::value::key_string;
use sea_query::Value;
use std::fmt;
use std::rc::Rc;

/// Canonical identifier of a linked model
#[derive(Debug, Clone)]
pub struct LinkId {
    encoded: String,
    values: Vec<Value>,
}

impl LinkId {
    /// Identifier for a key made of `values`
    ///
    /// # Example
    ///
    /// ```
    /// use sea_query::Value;
    /// use throughway::relation::links::LinkId;
    ///
    /// assert_eq!(LinkId::from_values(vec![Value::Int(Some(7))]).as_str(), "7");
    /// assert_eq!(
    ///     LinkId::from_values(vec![Value::Int(Some(7)), Value::Int(Some(3))]).as_str(),
    ///     "[7][3]"
    /// );
    /// ```
    pub fn from_values(values: Vec<Value>) -> Self {
        let encoded = match values.as_slice() {
            [single] => key_string(single),
            many => many.iter().map(|v| format!("[{}]", key_string(v))).collect(),
        };
        Self { encoded, values }
    }

    /// Decode a stored identifier for a key of `arity` columns.
    ///
    /// Components come back as strings exactly as written; `"007"` stays `"007"`.
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` if a composite identifier is not
    /// bracket-delimited or has the wrong number of components.
    pub fn parse(relation: &str, encoded: &str, arity: usize) -> Result<Self> {
        if arity <= 1 {
            return Ok(Self::from(encoded));
        }
        let inner = encoded
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| {
                RelationError::configuration(relation, format!("malformed link identifier: {}", encoded))
            })?;
        let values: Vec<Value> = inner
            .split("][")
            .map(|component| Value::String(Some(component.to_string())))
            .collect();
        if values.len() != arity {
            return Err(RelationError::configuration(
                relation,
                format!(
                    "link identifier {} has {} components, expected {}",
                    encoded,
                    values.len(),
                    arity
                ),
            ));
        }
        Ok(Self {
            encoded: encoded.to_string(),
            values,
        })
    }

    /// Encoded form
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Key values in key order
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// A caller-chosen key, carried as a single string value
impl From<&str> for LinkId {
    fn from(key: &str) -> Self {
        Self {
            encoded: key.to_string(),
            values: vec![Value::String(Some(key.to_string()))],
        }
    }
}

impl From<String> for LinkId {
    fn from(key: String) -> Self {
        Self {
            values: vec![Value::String(Some(key.clone()))],
            encoded: key,
        }
    }
}

impl PartialEq for LinkId {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for LinkId {}

impl std::hash::Hash for LinkId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.encoded.hash(state);
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Ordered mapping from link key to model
#[derive(Debug, Clone, Default)]
pub struct LinkMap {
    entries: Vec<(LinkId, ModelRef)>,
}

impl LinkMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the model under `key`, keeping the position of an existing key
    pub fn insert(&mut self, key: impl Into<LinkId>, model: ModelRef) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => *entry = (key, model),
            None => self.entries.push((key, model)),
        }
    }

    /// Builder form of [`LinkMap::insert`]
    pub fn with(mut self, key: impl Into<LinkId>, model: ModelRef) -> Self {
        self.insert(key, model);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ModelRef> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.as_str() == key)
            .map(|(_, model)| model)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove the entry under `key`
    pub fn remove(&mut self, key: &str) -> Option<ModelRef> {
        let position = self.entries.iter().position(|(existing, _)| existing.as_str() == key)?;
        Some(self.entries.remove(position).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelRef> {
        self.entries.iter().map(|(_, model)| model)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LinkId, &ModelRef)> {
        self.entries.iter().map(|(key, model)| (key, model))
    }

    /// Link identifiers of every entry, for a key of `arity` columns.
    ///
    /// Entries inserted by `get` keep the typed key values they were fetched
    /// with. Any other key is decoded with [`LinkId::parse`].
    ///
    /// # Errors
    ///
    /// Returns `RelationError::Configuration` if a key is not a valid identifier.
    pub fn link_ids(&self, relation: &str, arity: usize) -> Result<Vec<LinkId>> {
        self.entries
            .iter()
            .map(|(key, _)| {
                if key.values().len() == arity.max(1) {
                    Ok(key.clone())
                } else {
                    LinkId::parse(relation, key.as_str(), arity)
                }
            })
            .collect()
    }
}

impl PartialEq for LinkMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|((ka, ma), (kb, mb))| ka == kb && Rc::ptr_eq(ma, mb))
    }
}

/// Value of a model's relation cache entry
#[derive(Debug, Clone, Default)]
pub enum Related {
    /// Nothing loaded or assigned
    #[default]
    None,
    /// A single model, as used by singular relations
    One(ModelRef),
    /// A keyed set of models
    Many(LinkMap),
}

impl Related {
    /// Models held by this entry, in order
    pub fn models(&self) -> Vec<ModelRef> {
        match self {
            Related::None => Vec::new(),
            Related::One(model) => vec![Rc::clone(model)],
            Related::Many(links) => links.models().cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Related::None => true,
            Related::One(_) => false,
            Related::Many(links) => links.is_empty(),
        }
    }

    /// The link set, if this entry holds one
    pub fn as_many(&self) -> Option<&LinkMap> {
        match self {
            Related::Many(links) => Some(links),
            _ => None,
        }
    }
}

impl From<LinkMap> for Related {
    fn from(links: LinkMap) -> Self {
        Related::Many(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::model_ref;
    use crate::test_helpers::MemoryModel;

    #[test]
    fn test_single_value_is_raw() {
        let id = LinkId::from_values(vec![Value::String(Some("en".to_string()))]);
        assert_eq!(id.as_str(), "en");
    }

    #[test]
    fn test_composite_round_trip() {
        let id = LinkId::from_values(vec![Value::Int(Some(7)), Value::Int(Some(3))]);
        assert_eq!(id.as_str(), "[7][3]");

        let decoded = LinkId::parse("members", id.as_str(), 2).unwrap();
        assert_eq!(
            decoded.values(),
            &[Value::String(Some("7".to_string())), Value::String(Some("3".to_string()))]
        );
        assert_eq!(decoded, id);
    }

    #[test]
    fn test_equality_ignores_value_width() {
        let from_model = LinkId::from_values(vec![Value::Int(Some(12))]);
        let stored = LinkId::parse("tags", "12", 1).unwrap();
        assert_eq!(from_model, stored);
    }

    #[test]
    fn test_parse_rejects_malformed_composite() {
        assert!(LinkId::parse("members", "7,3", 2).is_err());
        assert!(LinkId::parse("members", "[7][3][1]", 2).is_err());
    }

    #[test]
    fn test_parse_keeps_components_verbatim() {
        // EDGE CASE: a VARCHAR key with leading zeros must not turn into a number
        let single = LinkId::parse("tags", "007", 1).unwrap();
        assert_eq!(single.values(), &[Value::String(Some("007".to_string()))]);

        let composite = LinkId::parse("translations", "[12][en-GB]", 2).unwrap();
        assert_eq!(
            composite.values(),
            &[Value::String(Some("12".to_string())), Value::String(Some("en-GB".to_string()))]
        );
    }

    #[test]
    fn test_link_map_keeps_insertion_order() {
        let a = model_ref(MemoryModel::new("Tag").with("id", 1i64));
        let b = model_ref(MemoryModel::new("Tag").with("id", 2i64));
        let c = model_ref(MemoryModel::new("Tag").with("id", 3i64));

        let mut links = LinkMap::new().with("x", a).with("y", b.clone());
        links.insert("x", c.clone());

        assert_eq!(links.keys().collect::<Vec<_>>(), vec!["x", "y"]);
        assert!(Rc::ptr_eq(links.get("x").unwrap(), &c));
        assert!(Rc::ptr_eq(&links.remove("y").unwrap(), &b));
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_link_ids_keep_fetched_values() {
        let tag = model_ref(MemoryModel::new("Tag").with("code", "007"));
        let fetched = LinkId::from_values(vec![Value::String(Some("007".to_string()))]);
        let numeric = LinkId::from_values(vec![Value::BigInt(Some(9))]);
        let links = LinkMap::new().with(fetched, tag.clone()).with(numeric, tag);

        let ids = links.link_ids("tags", 1).unwrap();
        assert_eq!(ids[0].values(), &[Value::String(Some("007".to_string()))]);
        assert_eq!(ids[1].values(), &[Value::BigInt(Some(9))]);
    }

    #[test]
    fn test_link_ids_decode_caller_keys() {
        let tag = model_ref(MemoryModel::new("Tag"));
        let links = LinkMap::new().with("[4][en]", tag);

        let ids = links.link_ids("translations", 2).unwrap();
        assert_eq!(
            ids[0].values(),
            &[Value::String(Some("4".to_string())), Value::String(Some("en".to_string()))]
        );
        assert!(links.link_ids("translations", 3).is_err());
    }

    #[test]
    fn test_related_models() {
        let a = model_ref(MemoryModel::new("Tag").with("id", 1i64));
        assert!(Related::None.is_empty());
        assert_eq!(Related::One(a.clone()).models().len(), 1);
        assert_eq!(Related::from(LinkMap::new().with("1", a)).models().len(), 1);
    }
}
