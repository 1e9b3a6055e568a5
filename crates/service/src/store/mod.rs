//! Outbound seam to the document store.
//!
//! Documents are JSON objects grouped as database → container → partition.
//! Every container here is partitioned on `/id`, so each record sits alone in
//! its partition and any multi-record query runs cross-partition.

pub mod connector;
pub mod cosmos;
pub mod credential;
pub mod memory;
pub mod query;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use connector::{LocalConnector, StoreConnector};
pub use cosmos::{CosmosClient, CosmosConnector};
pub use credential::{select_credential, Credential};
pub use memory::MemoryStore;
pub use query::{CompareOp, Operand, Predicate, Projection, QueryParam, QuerySpec};

pub const PARTITION_KEY_PATH: &str = "/id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Database,
    Container,
    Item,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Database => "database",
            ResourceKind::Container => "container",
            ResourceKind::Item => "item",
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: ResourceKind, name: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound { kind, name: name.into() }
    }

    /// Missing database or container; cured by provisioning.
    pub fn is_schema_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { kind: ResourceKind::Database | ResourceKind::Container, .. })
    }

    pub fn is_item_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { kind: ResourceKind::Item, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    pub database: String,
    pub container: String,
}

impl ContainerRef {
    pub fn new(database: impl Into<String>, container: impl Into<String>) -> Self {
        Self { database: database.into(), container: container.into() }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}/{}", self.database, self.container) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub id: String,
    pub partition_key_path: String,
    pub throughput: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub enable_cross_partition: bool,
    /// Upper bound on rows returned.
    pub max_item_count: Option<u32>,
}

impl QueryOptions {
    pub fn cross_partition(max_item_count: Option<u32>) -> Self {
        Self { enable_cross_partition: true, max_item_count }
    }
}

/// Client surface of a key-partitioned document database.
///
/// Item writes derive the partition key from the document using the
/// container's partition key path.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read_database(&self, database: &str) -> Result<(), StoreError>;
    async fn read_container(&self, target: &ContainerRef) -> Result<(), StoreError>;

    /// Returns `true` when the database was created by this call.
    async fn create_database_if_not_exists(&self, database: &str) -> Result<bool, StoreError>;
    /// Returns `true` when the container was created by this call.
    async fn create_container_if_not_exists(&self, database: &str, spec: &ContainerSpec) -> Result<bool, StoreError>;

    async fn create_item(&self, target: &ContainerRef, document: Value) -> Result<Value, StoreError>;
    async fn read_item(&self, target: &ContainerRef, id: &str, partition_key: &str) -> Result<Value, StoreError>;
    async fn replace_item(&self, target: &ContainerRef, id: &str, document: Value) -> Result<Value, StoreError>;
    async fn delete_item(&self, target: &ContainerRef, id: &str, partition_key: &str) -> Result<(), StoreError>;

    async fn query_items(&self, target: &ContainerRef, query: &QuerySpec, options: &QueryOptions) -> Result<Vec<Value>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classes() {
        assert!(StoreError::not_found(ResourceKind::Database, "db").is_schema_not_found());
        assert!(StoreError::not_found(ResourceKind::Container, "db/c").is_schema_not_found());
        let item = StoreError::not_found(ResourceKind::Item, "p1");
        assert!(item.is_item_not_found());
        assert!(!item.is_schema_not_found());
        assert!(!StoreError::Conflict("p1".into()).is_item_not_found());
    }
}
