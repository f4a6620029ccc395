//! In-memory collaborators for tests.
//!
//! - [`RecordingExecutor`]: captures every statement with its bound values,
//!   returns canned rows and can be told to fail the next call
//! - [`MemoryModel`]: a model instance backed by a field list, recording
//!   save/delete calls in a [`Journal`]
//! - [`MemoryModelType`]: model type metadata that hydrates `MemoryModel`s

use crate::error::{RelationError, Result};
use crate::executor::{Executor, ExecutorError, Row};
use crate::model::{model_ref, Model, ModelRef, ModelType};
use crate::relation::links::Related;
use sea_query::{Value, Values};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Executor that records statements instead of running them
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<(String, Values)>>,
    rows: Mutex<VecDeque<Vec<Row>>>,
    affected: Mutex<VecDeque<u64>>,
    failure: Mutex<Option<String>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result set of the next `query_all` call
    pub fn push_rows(&self, rows: Vec<Row>) {
        lock(&self.rows).push_back(rows);
    }

    /// Queue the affected-row count of the next `execute` call; defaults to 1
    pub fn push_affected(&self, affected: u64) {
        lock(&self.affected).push_back(affected);
    }

    /// Make the next call fail with `ExecutorError::Query(message)`
    pub fn fail_next(&self, message: impl Into<String>) {
        *lock(&self.failure) = Some(message.into());
    }

    /// Every statement seen so far, in order
    pub fn statements(&self) -> Vec<(String, Values)> {
        lock(&self.statements).clone()
    }

    /// SQL text of every statement seen so far
    pub fn sql(&self) -> Vec<String> {
        lock(&self.statements).iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn clear(&self) {
        lock(&self.statements).clear();
    }

    fn record(&self, sql: &str, values: &Values) -> Result<(), ExecutorError> {
        lock(&self.statements).push((sql.to_string(), values.clone()));
        match lock(&self.failure).take() {
            Some(message) => Err(ExecutorError::Query(message)),
            None => Ok(()),
        }
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, sql: &str, values: &Values) -> Result<u64, ExecutorError> {
        self.record(sql, values)?;
        Ok(lock(&self.affected).pop_front().unwrap_or(1))
    }

    fn query_all(&self, sql: &str, values: &Values) -> Result<Vec<Row>, ExecutorError> {
        self.record(sql, values)?;
        Ok(lock(&self.rows).pop_front().unwrap_or_default())
    }
}

/// Shared log of model save/delete calls
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        lock(&self.events).push(event.into());
    }

    /// Events in call order, e.g. `save Tag cascade=Some(false)`
    pub fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }
}

/// Model instance backed by an ordered field list
#[derive(Debug, Clone)]
pub struct MemoryModel {
    name: String,
    fields: Vec<(String, Value)>,
    is_new: bool,
    assign_id: Option<i64>,
    failure: Option<String>,
    related: BTreeMap<String, Related>,
    journal: Journal,
}

impl MemoryModel {
    /// A new, unsaved instance of `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            is_new: true,
            assign_id: None,
            failure: None,
            related: BTreeMap::new(),
            journal: Journal::new(),
        }
    }

    /// Set a field, builder style
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Mark the instance as already persisted
    pub fn persisted(mut self) -> Self {
        self.is_new = false;
        self
    }

    /// On its first save, the instance gets `id` = `id`
    pub fn assigns_id(mut self, id: i64) -> Self {
        self.assign_id = Some(id);
        self
    }

    /// Make save and delete fail with `message`
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Record into `journal` instead of a private one
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    fn check(&self, action: &str, cascade: Option<bool>) -> Result<()> {
        self.journal
            .record(format!("{} {} cascade={:?}", action, self.name, cascade));
        match &self.failure {
            Some(message) => Err(RelationError::model(self.name.as_str(), message.as_str())),
            None => Ok(()),
        }
    }
}

impl Model for MemoryModel {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn get(&self, field: &str) -> Option<Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.clone())
    }

    fn is_new(&self) -> bool {
        self.is_new
    }

    fn save(&mut self, cascade: Option<bool>) -> Result<()> {
        self.check("save", cascade)?;
        if self.is_new {
            if let Some(id) = self.assign_id {
                self.set("id", id);
            }
            self.is_new = false;
        }
        Ok(())
    }

    fn delete(&mut self, cascade: Option<bool>) -> Result<()> {
        self.check("delete", cascade)
    }

    fn related(&self, relation: &str) -> Option<&Related> {
        self.related.get(relation)
    }

    fn replace_related(&mut self, relation: &str, value: Related) {
        self.related.insert(relation.to_string(), value);
    }
}

/// Model type hydrating [`MemoryModel`]s, running on a [`RecordingExecutor`]
#[derive(Debug)]
pub struct MemoryModelType {
    name: String,
    table: String,
    primary_key: Vec<String>,
    columns: Vec<String>,
    executor: Arc<RecordingExecutor>,
}

impl MemoryModelType {
    /// Type `name` stored in `table`, keyed by `id`
    pub fn new(name: impl Into<String>, table: impl Into<String>, executor: Arc<RecordingExecutor>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: vec!["id".to_string()],
            columns: Vec::new(),
            executor,
        }
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }
}

impl ModelType for MemoryModelType {
    fn name(&self) -> &str {
        &self.name
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn connection(&self) -> Arc<dyn Executor> {
        self.executor.clone()
    }

    fn hydrate(&self, row: &Row) -> Result<ModelRef> {
        let mut model = MemoryModel::new(self.name.as_str()).persisted();
        for (column, value) in row.iter() {
            if model.get(column).is_none() {
                model.set(column, value.clone());
            }
        }
        Ok(model_ref(model))
    }
}
