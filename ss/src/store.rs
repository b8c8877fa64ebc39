//! Core Store implementation
//!
//! One JSONL operation log per collection, replayed into memory on open.
//! An exclusive advisory lock on `{store}/.lock` keeps a second process out.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{Filter, FilterOp, IndexValue, Record, StoreError};

/// One logged operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LogOp {
    Create {
        id: String,
        fields: HashMap<String, IndexValue>,
        record: Value,
    },
    Update {
        id: String,
        fields: HashMap<String, IndexValue>,
        record: Value,
    },
    Delete {
        id: String,
    },
}

/// In-memory view of one collection
#[derive(Debug, Default)]
struct Collection {
    /// id -> latest record JSON
    records: HashMap<String, Value>,
    /// id -> indexed field values (needed to unwind index entries)
    fields: HashMap<String, HashMap<String, IndexValue>>,
    /// field -> value -> ids
    indexes: HashMap<String, HashMap<IndexValue, HashSet<String>>>,
}

impl Collection {
    fn apply(&mut self, op: LogOp) {
        match op {
            LogOp::Create { id, fields, record } | LogOp::Update { id, fields, record } => {
                self.unindex(&id);
                for (field, value) in &fields {
                    self.indexes
                        .entry(field.clone())
                        .or_default()
                        .entry(value.clone())
                        .or_default()
                        .insert(id.clone());
                }
                self.fields.insert(id.clone(), fields);
                self.records.insert(id, record);
            }
            LogOp::Delete { id } => {
                self.unindex(&id);
                self.fields.remove(&id);
                self.records.remove(&id);
            }
        }
    }

    fn unindex(&mut self, id: &str) {
        if let Some(old) = self.fields.get(id) {
            for (field, value) in old {
                if let Some(by_value) = self.indexes.get_mut(field)
                    && let Some(ids) = by_value.get_mut(value)
                {
                    ids.remove(id);
                    if ids.is_empty() {
                        by_value.remove(value);
                    }
                }
            }
        }
    }

    /// Ids holding `value` on `field`, excluding `except`
    fn holders(&self, field: &str, value: &IndexValue, except: Option<&str>) -> Option<String> {
        self.indexes
            .get(field)
            .and_then(|by_value| by_value.get(value))
            .and_then(|ids| ids.iter().find(|id| Some(id.as_str()) != except))
            .cloned()
    }
}

/// Aggregate statistics for the store
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// (collection, live record count) pairs
    pub collections: Vec<(String, usize)>,
    /// Total live records across all collections
    pub total_records: usize,
}

/// The persistent record store
pub struct Store {
    base_path: PathBuf,
    /// Held for the lifetime of the store; dropped lock releases the file
    _lock: File,
    collections: HashMap<String, Collection>,
}

impl Store {
    /// Open or create a store at the given directory
    ///
    /// Acquires an exclusive advisory lock; a second opener gets
    /// [`StoreError::Locked`] instead of corrupting the logs.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(base_path.join(".lock"))?;
        lock.try_lock_exclusive().map_err(|_| StoreError::Locked)?;

        let mut store = Self {
            base_path,
            _lock: lock,
            collections: HashMap::new(),
        };
        store.sync()?;

        debug!(path = %store.base_path.display(), "Store opened");
        Ok(store)
    }

    /// Re-read all collection logs from disk, replacing the in-memory view
    pub fn sync(&mut self) -> Result<(), StoreError> {
        self.collections.clear();

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "jsonl").unwrap_or(false)
                && let Some(name) = path.file_stem().and_then(|s| s.to_str())
            {
                let collection = self.replay(&path)?;
                self.collections.insert(name.to_string(), collection);
            }
        }

        debug!(collections = self.collections.len(), "Store synced");
        Ok(())
    }

    fn replay(&self, path: &Path) -> Result<Collection, StoreError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut collection = Collection::default();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogOp>(&line) {
                Ok(op) => collection.apply(op),
                Err(e) => {
                    // A torn final line from a crashed writer is tolerated
                    warn!(path = %path.display(), line = line_no + 1, error = %e, "Skipping unreadable log line");
                }
            }
        }

        Ok(collection)
    }

    fn log_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", collection))
    }

    fn append(&self, collection: &str, op: &LogOp) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(collection))?;
        let line = serde_json::to_string(op)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Create a new record, returning its ID
    ///
    /// Fails with [`StoreError::DuplicateId`] if the ID exists, or
    /// [`StoreError::Conflict`] if a unique field is already taken.
    pub fn create<T: Record>(&mut self, record: T) -> Result<String, StoreError> {
        let name = T::collection_name();
        let id = record.id().to_string();
        let fields = record.indexed_fields();

        {
            let collection = self.collections.entry(name.to_string()).or_default();
            if collection.records.contains_key(&id) {
                return Err(StoreError::DuplicateId(id));
            }
            check_unique::<T>(collection, &fields, None)?;
        }

        let op = LogOp::Create {
            id: id.clone(),
            fields,
            record: serde_json::to_value(&record)?,
        };
        self.append(name, &op)?;
        if let Some(collection) = self.collections.get_mut(name) {
            collection.apply(op);
        }

        debug!(collection = name, %id, "Record created");
        Ok(id)
    }

    /// Get a record by ID
    pub fn get<T: Record>(&self, id: &str) -> Result<Option<T>, StoreError> {
        match self
            .collections
            .get(T::collection_name())
            .and_then(|c| c.records.get(id))
        {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Update an existing record
    pub fn update<T: Record>(&mut self, record: T) -> Result<(), StoreError> {
        let name = T::collection_name();
        let id = record.id().to_string();
        let fields = record.indexed_fields();

        {
            let collection = self.collections.entry(name.to_string()).or_default();
            if !collection.records.contains_key(&id) {
                return Err(StoreError::NotFound(id));
            }
            check_unique::<T>(collection, &fields, Some(&id))?;
        }

        let op = LogOp::Update {
            id: id.clone(),
            fields,
            record: serde_json::to_value(&record)?,
        };
        self.append(name, &op)?;
        if let Some(collection) = self.collections.get_mut(name) {
            collection.apply(op);
        }

        debug!(collection = name, %id, "Record updated");
        Ok(())
    }

    /// Delete a record by ID (no-op if absent)
    pub fn delete<T: Record>(&mut self, id: &str) -> Result<(), StoreError> {
        let name = T::collection_name();
        let exists = self
            .collections
            .get(name)
            .map(|c| c.records.contains_key(id))
            .unwrap_or(false);
        if !exists {
            debug!(collection = name, %id, "Delete of absent record ignored");
            return Ok(());
        }

        let op = LogOp::Delete { id: id.to_string() };
        self.append(name, &op)?;
        if let Some(collection) = self.collections.get_mut(name) {
            collection.apply(op);
        }

        debug!(collection = name, %id, "Record deleted");
        Ok(())
    }

    /// List records matching all filters, oldest update first
    ///
    /// Filters must name indexed fields; unindexed fields match nothing.
    pub fn list<T: Record>(&self, filters: &[Filter]) -> Result<Vec<T>, StoreError> {
        let Some(collection) = self.collections.get(T::collection_name()) else {
            return Ok(Vec::new());
        };

        let mut ids: Vec<&String> = match filters.len() {
            0 => collection.records.keys().collect(),
            _ => {
                let mut candidate: Option<HashSet<&String>> = None;
                for filter in filters {
                    let FilterOp::Eq = filter.op;
                    let matched: HashSet<&String> = collection
                        .indexes
                        .get(&filter.field)
                        .and_then(|by_value| by_value.get(&filter.value))
                        .map(|ids| ids.iter().collect())
                        .unwrap_or_default();
                    candidate = Some(match candidate {
                        None => matched,
                        Some(prev) => prev.intersection(&matched).copied().collect(),
                    });
                }
                candidate.unwrap_or_default().into_iter().collect()
            }
        };

        // Deterministic ordering regardless of hash-map iteration
        ids.sort_by_key(|id| {
            let ms = collection
                .records
                .get(*id)
                .and_then(|r| r.get("updated_at"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            (ms, (*id).clone())
        });

        ids.into_iter()
            .filter_map(|id| collection.records.get(id))
            .map(|value| serde_json::from_value(value.clone()).map_err(StoreError::from))
            .collect()
    }

    /// Recompute indexes for a record type from typed records
    ///
    /// Returns the number of records reindexed.
    pub fn rebuild_indexes<T: Record>(&mut self) -> Result<usize, StoreError> {
        let name = T::collection_name();
        let Some(collection) = self.collections.get_mut(name) else {
            return Ok(0);
        };

        let records: Vec<(String, Value)> = collection
            .records
            .iter()
            .map(|(id, v)| (id.clone(), v.clone()))
            .collect();

        collection.indexes.clear();
        collection.fields.clear();

        let mut count = 0;
        for (id, value) in records {
            let record: T = serde_json::from_value(value)?;
            let fields = record.indexed_fields();
            for (field, index_value) in &fields {
                collection
                    .indexes
                    .entry(field.clone())
                    .or_default()
                    .entry(index_value.clone())
                    .or_default()
                    .insert(id.clone());
            }
            collection.fields.insert(id, fields);
            count += 1;
        }

        debug!(collection = name, count, "Indexes rebuilt");
        Ok(count)
    }

    /// Rewrite every collection log down to its live records
    pub fn compact(&mut self) -> Result<(), StoreError> {
        for (name, collection) in &self.collections {
            let path = self.log_path(name);
            let tmp = path.with_extension("jsonl.tmp");
            {
                let mut file = File::create(&tmp)?;
                let mut ids: Vec<&String> = collection.records.keys().collect();
                ids.sort();
                for id in ids {
                    let op = LogOp::Create {
                        id: id.clone(),
                        fields: collection.fields.get(id).cloned().unwrap_or_default(),
                        record: collection.records[id].clone(),
                    };
                    writeln!(file, "{}", serde_json::to_string(&op)?)?;
                }
            }
            fs::rename(&tmp, &path)?;
            info!(collection = %name, records = collection.records.len(), "Compacted");
        }
        Ok(())
    }

    /// Names of all known collections
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Untyped records of a collection (for inspection tooling)
    pub fn list_raw(&self, collection: &str) -> Vec<Value> {
        let Some(collection) = self.collections.get(collection) else {
            return Vec::new();
        };
        let mut ids: Vec<&String> = collection.records.keys().collect();
        ids.sort();
        ids.into_iter().map(|id| collection.records[id].clone()).collect()
    }

    /// One untyped record by collection and ID
    pub fn get_raw(&self, collection: &str, id: &str) -> Option<Value> {
        self.collections.get(collection).and_then(|c| c.records.get(id)).cloned()
    }

    /// Aggregate statistics
    pub fn stats(&self) -> StoreStats {
        let mut collections: Vec<(String, usize)> = self
            .collections
            .iter()
            .map(|(name, c)| (name.clone(), c.records.len()))
            .collect();
        collections.sort();
        let total_records = collections.iter().map(|(_, n)| n).sum();
        StoreStats {
            collections,
            total_records,
        }
    }

}

fn check_unique<T: Record>(
    collection: &Collection,
    fields: &HashMap<String, IndexValue>,
    except: Option<&str>,
) -> Result<(), StoreError> {
    for field in T::unique_fields() {
        if let Some(value) = fields.get(*field)
            && let Some(holder) = collection.holders(field, value, except)
        {
            return Err(StoreError::Conflict {
                field: field.to_string(),
                value: value.to_string(),
                holder,
            });
        }
    }
    Ok(())
}
