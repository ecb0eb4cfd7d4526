//! Persistence collaborator
//!
//! The hosted backend is modelled as row storage with change
//! notifications. Rows are JSON objects grouped in named tables.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A stored row
pub type Record = Map<String, Value>;

/// Callback invoked with the new row after a matching write
pub type ChangeCallback = Box<dyn Fn(&Record) + Send>;

/// Persistence error
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid record: {0}")]
    Invalid(String),
}

/// Equality filter over row fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: BTreeMap<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.fields
            .iter()
            .all(|(field, value)| record.get(field) == Some(value))
    }
}

/// Handle returned by [`Store::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// Row storage with change notifications
pub trait Store {
    /// First row in `table` matching `filter`
    fn get(&self, table: &str, filter: &Filter) -> Result<Option<Record>, StoreError>;

    /// Insert `record`, replacing any row that agrees on all `conflict_keys`
    fn upsert(&mut self, table: &str, record: Record, conflict_keys: &[&str])
        -> Result<(), StoreError>;

    /// Get notified after every write to a row in `table` matching `filter`
    fn subscribe(
        &mut self,
        table: &str,
        filter: Filter,
        on_change: ChangeCallback,
    ) -> Result<SubscriptionHandle, StoreError>;

    /// Stop notifications. Returns false for an unknown handle.
    fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool;
}

/// Read a row and decode it into a typed record
pub fn get_as<T: DeserializeOwned>(
    store: &dyn Store,
    table: &str,
    filter: &Filter,
) -> Result<Option<T>, StoreError> {
    match store.get(table, filter)? {
        Some(record) => Ok(Some(serde_json::from_value(Value::Object(record))?)),
        None => Ok(None),
    }
}

/// Encode a typed record and upsert it
pub fn upsert_as<T: Serialize>(
    store: &mut dyn Store,
    table: &str,
    value: &T,
    conflict_keys: &[&str],
) -> Result<(), StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(record) => store.upsert(table, record, conflict_keys),
        other => Err(StoreError::Invalid(format!(
            "expected an object for table '{}', got {}",
            table, other
        ))),
    }
}

struct Subscription {
    handle: SubscriptionHandle,
    table: String,
    filter: Filter,
    on_change: ChangeCallback,
}

/// Table contents, serialized as-is by [`JsonFileStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    tables: BTreeMap<String, Vec<Record>>,
}

impl Tables {
    fn get(&self, table: &str, filter: &Filter) -> Option<Record> {
        self.tables
            .get(table)?
            .iter()
            .find(|record| filter.matches(record))
            .cloned()
    }

    fn upsert(&mut self, table: &str, record: Record, conflict_keys: &[&str]) -> Result<(), StoreError> {
        for key in conflict_keys {
            if !record.contains_key(*key) {
                return Err(StoreError::Invalid(format!(
                    "record for table '{}' is missing key field '{}'",
                    table, key
                )));
            }
        }

        let rows = self.tables.entry(table.to_string()).or_default();
        let existing = rows.iter_mut().find(|row| {
            !conflict_keys.is_empty() && conflict_keys.iter().all(|k| row.get(*k) == record.get(*k))
        });

        match existing {
            Some(row) => *row = record,
            None => rows.push(record),
        }
        Ok(())
    }
}

#[derive(Default)]
struct Subscriptions {
    entries: Vec<Subscription>,
    next_id: u64,
}

impl Subscriptions {
    fn add(&mut self, table: &str, filter: Filter, on_change: ChangeCallback) -> SubscriptionHandle {
        self.next_id += 1;
        let handle = SubscriptionHandle(self.next_id);
        self.entries.push(Subscription {
            handle,
            table: table.to_string(),
            filter,
            on_change,
        });
        handle
    }

    fn remove(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|s| s.handle != handle);
        self.entries.len() != before
    }

    fn notify(&self, table: &str, record: &Record) {
        for sub in &self.entries {
            if sub.table == table && sub.filter.matches(record) {
                (sub.on_change)(record);
            }
        }
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    data: Tables,
    subscriptions: Subscriptions,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in a table
    pub fn row_count(&self, table: &str) -> usize {
        self.data.tables.get(table).map(Vec::len).unwrap_or(0)
    }
}

impl Store for MemoryStore {
    fn get(&self, table: &str, filter: &Filter) -> Result<Option<Record>, StoreError> {
        Ok(self.data.get(table, filter))
    }

    fn upsert(
        &mut self,
        table: &str,
        record: Record,
        conflict_keys: &[&str],
    ) -> Result<(), StoreError> {
        self.data.upsert(table, record.clone(), conflict_keys)?;
        self.subscriptions.notify(table, &record);
        Ok(())
    }

    fn subscribe(
        &mut self,
        table: &str,
        filter: Filter,
        on_change: ChangeCallback,
    ) -> Result<SubscriptionHandle, StoreError> {
        Ok(self.subscriptions.add(table, filter, on_change))
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.subscriptions.remove(handle)
    }
}

/// Store backed by a single pretty-printed JSON file, rewritten on every write
pub struct JsonFileStore {
    path: PathBuf,
    data: Tables,
    subscriptions: Subscriptions,
}

impl JsonFileStore {
    /// Open a store file. A missing file starts empty.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let data = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            if content.trim().is_empty() {
                Tables::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Tables::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            data,
            subscriptions: Subscriptions::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, data: &Tables) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl Store for JsonFileStore {
    fn get(&self, table: &str, filter: &Filter) -> Result<Option<Record>, StoreError> {
        Ok(self.data.get(table, filter))
    }

    fn upsert(
        &mut self,
        table: &str,
        record: Record,
        conflict_keys: &[&str],
    ) -> Result<(), StoreError> {
        // Rows only become visible once they are on disk
        let mut data = self.data.clone();
        data.upsert(table, record.clone(), conflict_keys)?;
        self.save(&data)?;
        self.data = data;
        self.subscriptions.notify(table, &record);
        Ok(())
    }

    fn subscribe(
        &mut self,
        table: &str,
        filter: Filter,
        on_change: ChangeCallback,
    ) -> Result<SubscriptionHandle, StoreError> {
        Ok(self.subscriptions.add(table, filter, on_change))
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.subscriptions.remove(handle)
    }
}
