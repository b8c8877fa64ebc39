//! SessionStore - generic persistent record storage
//!
//! Records implement the [`Record`] trait and are persisted to an append-only
//! JSONL operation log per collection. On open the log is replayed into
//! in-memory maps plus equality indexes, so reads never touch disk.
//!
//! # Core Concepts
//!
//! - **One log per collection**: `{store}/{collection}.jsonl`, one operation
//!   per line (create/update/delete)
//! - **Last write wins**: replay order resolves conflicts; `compact()`
//!   rewrites the log to its live records
//! - **Uniqueness constraints**: fields listed in [`Record::unique_fields`]
//!   reject a second record with the same indexed value

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cli;
mod store;

pub use store::{Store, StoreStats};

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A value that can be indexed for equality lookups
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl std::fmt::Display for IndexValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexValue::String(s) => write!(f, "{}", s),
            IndexValue::Int(i) => write!(f, "{}", i),
            IndexValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Comparison operator for filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
}

/// A single filter on an indexed field
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: IndexValue,
}

impl Filter {
    /// Equality filter on an indexed field
    pub fn eq(field: impl Into<String>, value: IndexValue) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value,
        }
    }
}

/// A persistable record
///
/// Implementors declare their collection name and which fields are indexed.
/// Fields named in `unique_fields` must also appear in `indexed_fields`; a
/// create (or an update moving a record onto an occupied value) fails with
/// [`StoreError::Conflict`].
pub trait Record: Serialize + for<'de> Deserialize<'de> + Clone {
    /// Unique record ID within the collection
    fn id(&self) -> &str;

    /// Last update timestamp (Unix milliseconds)
    fn updated_at(&self) -> i64;

    /// Collection this record belongs to
    fn collection_name() -> &'static str;

    /// Indexed fields for equality queries
    fn indexed_fields(&self) -> HashMap<String, IndexValue>;

    /// Indexed fields that must be unique across the collection
    fn unique_fields() -> &'static [&'static str] {
        &[]
    }
}

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record already exists: {0}")]
    DuplicateId(String),

    #[error("Unique constraint violated: {field}={value} already held by {holder}")]
    Conflict {
        field: String,
        value: String,
        holder: String,
    },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
