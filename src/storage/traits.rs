use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::error::StorageResult;

/// A named partition of records. Each one maps to its own table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Services,
    News,
    Tenders,
    Departments,
    Downloads,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Services,
        Collection::News,
        Collection::Tenders,
        Collection::Departments,
        Collection::Downloads,
    ];

    /// Table name and URL segment.
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Services => "services",
            Collection::News => "news",
            Collection::Tenders => "tenders",
            Collection::Departments => "departments",
            Collection::Downloads => "downloads",
        }
    }

    /// Singular label used in response messages.
    pub fn label(&self) -> &'static str {
        match self {
            Collection::Services => "Service",
            Collection::News => "News",
            Collection::Tenders => "Tender",
            Collection::Departments => "Department",
            Collection::Downloads => "Download",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub id: String,
    pub document: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub trait RecordStore {
    /// Every record of the collection, most recently updated first.
    fn list(&self, collection: Collection) -> StorageResult<Vec<Record>>;
    fn get(&self, collection: Collection, id: &str) -> StorageResult<Record>;
    fn insert(&self, collection: Collection, id: &str, document: &Value) -> StorageResult<Record>;
    /// Overwrites the whole document. Never creates a missing row.
    fn replace(&self, collection: Collection, id: &str, document: &Value)
        -> StorageResult<Record>;
    fn remove(&self, collection: Collection, id: &str) -> StorageResult<()>;
    fn close(&self) -> StorageResult<()>;
}
