use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{fs, sync::RwLock};
use tracing::{debug, warn};

use super::query::QuerySpec;
use super::{ContainerRef, ContainerSpec, DocumentStore, QueryOptions, ResourceKind, StoreError};

type Partition = BTreeMap<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContainerState {
    spec: ContainerSpec,
    partitions: BTreeMap<String, Partition>,
}

impl ContainerState {
    fn partition_key(&self, document: &Value) -> Result<String, StoreError> {
        match document.pointer(&self.spec.partition_key_path) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(StoreError::BadRequest(format!(
                "document lacks partition key {}",
                self.spec.partition_key_path
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DatabaseState {
    containers: BTreeMap<String, ContainerState>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    databases: BTreeMap<String, DatabaseState>,
}

impl Snapshot {
    fn container(&self, target: &ContainerRef) -> Result<&ContainerState, StoreError> {
        self.databases
            .get(&target.database)
            .ok_or_else(|| StoreError::not_found(ResourceKind::Database, &target.database))?
            .containers
            .get(&target.container)
            .ok_or_else(|| StoreError::not_found(ResourceKind::Container, target.to_string()))
    }

    fn container_mut(&mut self, target: &ContainerRef) -> Result<&mut ContainerState, StoreError> {
        self.databases
            .get_mut(&target.database)
            .ok_or_else(|| StoreError::not_found(ResourceKind::Database, &target.database))?
            .containers
            .get_mut(&target.container)
            .ok_or_else(|| StoreError::not_found(ResourceKind::Container, target.to_string()))
    }
}

/// In-process document store with the same observable behavior as the managed
/// service for the calls this crate makes. Optionally snapshots itself to a
/// JSON file after every mutation.
pub struct MemoryStore {
    inner: RwLock<Snapshot>,
    file_path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

impl MemoryStore {
    pub fn new() -> Self { Self { inner: RwLock::new(Snapshot::default()), file_path: None } }

    /// Load from a snapshot file, starting empty if it is missing or unreadable.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Self {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await.ok();
        }
        let snapshot = match fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %file_path.display(), error = %e, "ignoring unreadable store snapshot");
                Snapshot::default()
            }),
            Err(_) => Snapshot::default(),
        };
        Self { inner: RwLock::new(snapshot), file_path: Some(file_path) }
    }

    /// Apply one mutation under the write lock. `apply` returns its result and
    /// whether it changed anything. With a snapshot file the mutation runs on a
    /// copy that replaces the live state only after the file is written, so a
    /// failed write leaves nothing behind.
    async fn commit<T>(&self, apply: impl FnOnce(&mut Snapshot) -> Result<(T, bool), StoreError>) -> Result<T, StoreError> {
        let mut live = self.inner.write().await;
        let Some(path) = &self.file_path else {
            return apply(&mut *live).map(|(out, _)| out);
        };
        let mut next = Snapshot::clone(&live);
        let (out, changed) = apply(&mut next)?;
        if changed {
            let data = serde_json::to_vec(&next).map_err(|e| StoreError::Unavailable(e.to_string()))?;
            fs::write(path, data).await.map_err(|e| StoreError::Unavailable(e.to_string()))?;
            *live = next;
        }
        Ok(out)
    }

    pub async fn drop_database(&self, database: &str) -> Result<bool, StoreError> {
        self.commit(|snap| {
            let existed = snap.databases.remove(database).is_some();
            Ok((existed, existed))
        })
        .await
    }

    pub async fn drop_container(&self, target: &ContainerRef) -> Result<bool, StoreError> {
        self.commit(|snap| {
            let existed = snap
                .databases
                .get_mut(&target.database)
                .map(|db| db.containers.remove(&target.container).is_some())
                .unwrap_or(false);
            Ok((existed, existed))
        })
        .await
    }

    /// Number of documents in a container, or `None` if it does not exist.
    pub async fn document_count(&self, target: &ContainerRef) -> Option<usize> {
        let snap = self.inner.read().await;
        snap.container(target).ok().map(|c| c.partitions.values().map(BTreeMap::len).sum())
    }
}

fn stamp(document: &mut Value) {
    if let Value::Object(map) = document {
        map.insert("_ts".into(), Value::from(chrono::Utc::now().timestamp()));
        map.insert("_etag".into(), Value::String(format!("\"{}\"", uuid::Uuid::new_v4())));
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read_database(&self, database: &str) -> Result<(), StoreError> {
        let snap = self.inner.read().await;
        if snap.databases.contains_key(database) {
            Ok(())
        } else {
            Err(StoreError::not_found(ResourceKind::Database, database))
        }
    }

    async fn read_container(&self, target: &ContainerRef) -> Result<(), StoreError> {
        let snap = self.inner.read().await;
        snap.container(target).map(|_| ())
    }

    async fn create_database_if_not_exists(&self, database: &str) -> Result<bool, StoreError> {
        let created = self
            .commit(|snap| {
                if snap.databases.contains_key(database) {
                    return Ok((false, false));
                }
                snap.databases.insert(database.to_string(), DatabaseState::default());
                Ok((true, true))
            })
            .await?;
        if created {
            debug!(database, "database created");
        }
        Ok(created)
    }

    async fn create_container_if_not_exists(&self, database: &str, spec: &ContainerSpec) -> Result<bool, StoreError> {
        let created = self
            .commit(|snap| {
                let db = snap
                    .databases
                    .get_mut(database)
                    .ok_or_else(|| StoreError::not_found(ResourceKind::Database, database))?;
                if db.containers.contains_key(&spec.id) {
                    return Ok((false, false));
                }
                db.containers
                    .insert(spec.id.clone(), ContainerState { spec: spec.clone(), partitions: BTreeMap::new() });
                Ok((true, true))
            })
            .await?;
        if created {
            debug!(database, container = %spec.id, "container created");
        }
        Ok(created)
    }

    async fn create_item(&self, target: &ContainerRef, mut document: Value) -> Result<Value, StoreError> {
        let id = match document.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            _ => return Err(StoreError::BadRequest("document requires a non-empty string id".into())),
        };
        self.commit(|snap| {
            let container = snap.container_mut(target)?;
            let pk = container.partition_key(&document)?;
            let partition = container.partitions.entry(pk).or_default();
            if partition.contains_key(&id) {
                return Err(StoreError::Conflict(format!("id {id} already exists")));
            }
            stamp(&mut document);
            partition.insert(id, document.clone());
            Ok((document, true))
        })
        .await
    }

    async fn read_item(&self, target: &ContainerRef, id: &str, partition_key: &str) -> Result<Value, StoreError> {
        let snap = self.inner.read().await;
        snap.container(target)?
            .partitions
            .get(partition_key)
            .and_then(|p| p.get(id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(ResourceKind::Item, id))
    }

    async fn replace_item(&self, target: &ContainerRef, id: &str, mut document: Value) -> Result<Value, StoreError> {
        if document.get("id").and_then(Value::as_str) != Some(id) {
            return Err(StoreError::BadRequest(format!("document id does not match {id}")));
        }
        self.commit(|snap| {
            let container = snap.container_mut(target)?;
            let pk = container.partition_key(&document)?;
            let slot = container
                .partitions
                .get_mut(&pk)
                .and_then(|p| p.get_mut(id))
                .ok_or_else(|| StoreError::not_found(ResourceKind::Item, id))?;
            stamp(&mut document);
            *slot = document.clone();
            Ok((document, true))
        })
        .await
    }

    async fn delete_item(&self, target: &ContainerRef, id: &str, partition_key: &str) -> Result<(), StoreError> {
        self.commit(|snap| {
            let container = snap.container_mut(target)?;
            let partition = container
                .partitions
                .get_mut(partition_key)
                .ok_or_else(|| StoreError::not_found(ResourceKind::Item, id))?;
            if partition.remove(id).is_none() {
                return Err(StoreError::not_found(ResourceKind::Item, id));
            }
            if partition.is_empty() {
                container.partitions.remove(partition_key);
            }
            Ok(((), true))
        })
        .await
    }

    async fn query_items(&self, target: &ContainerRef, query: &QuerySpec, options: &QueryOptions) -> Result<Vec<Value>, StoreError> {
        if !options.enable_cross_partition {
            return Err(StoreError::BadRequest("cross-partition query is required but was not enabled".into()));
        }
        let snap = self.inner.read().await;
        let container = snap.container(target)?;

        let mut rows = Vec::new();
        for partition in container.partitions.values() {
            for doc in partition.values() {
                if query.matches(doc)? {
                    rows.push(doc.clone());
                }
            }
        }
        drop(snap);
        query.finish(rows, options.max_item_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::query::{CompareOp, Operand, OrderBy, Predicate, QueryParam, Slice};
    use crate::store::PARTITION_KEY_PATH;
    use serde_json::json;

    fn target() -> ContainerRef { ContainerRef::new("testdb", "things") }

    async fn provisioned() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_database_if_not_exists("testdb").await.unwrap();
        let spec = ContainerSpec { id: "things".into(), partition_key_path: PARTITION_KEY_PATH.into(), throughput: 400 };
        store.create_container_if_not_exists("testdb", &spec).await.unwrap();
        store
    }

    #[tokio::test]
    async fn missing_schema_reports_kind() {
        let store = MemoryStore::new();
        let err = store.read_container(&target()).await.unwrap_err();
        assert_eq!(err, StoreError::not_found(ResourceKind::Database, "testdb"));
        store.create_database_if_not_exists("testdb").await.unwrap();
        let err = store.read_item(&target(), "a", "a").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: ResourceKind::Container, .. }));
    }

    #[tokio::test]
    async fn create_is_idempotent_for_schema() {
        let store = provisioned().await;
        assert!(!store.create_database_if_not_exists("testdb").await.unwrap());
        let spec = ContainerSpec { id: "things".into(), partition_key_path: PARTITION_KEY_PATH.into(), throughput: 400 };
        assert!(!store.create_container_if_not_exists("testdb", &spec).await.unwrap());
    }

    #[tokio::test]
    async fn item_lifecycle() {
        let store = provisioned().await;
        let created = store.create_item(&target(), json!({"id": "a", "n": 1})).await.unwrap();
        assert!(created.get("_etag").is_some());
        assert!(matches!(store.create_item(&target(), json!({"id": "a"})).await, Err(StoreError::Conflict(_))));

        store.replace_item(&target(), "a", json!({"id": "a", "n": 2})).await.unwrap();
        assert_eq!(store.read_item(&target(), "a", "a").await.unwrap()["n"], 2);

        store.delete_item(&target(), "a", "a").await.unwrap();
        assert!(store.read_item(&target(), "a", "a").await.unwrap_err().is_item_not_found());
        assert!(store.delete_item(&target(), "a", "a").await.unwrap_err().is_item_not_found());
        assert!(store
            .replace_item(&target(), "a", json!({"id": "a"}))
            .await
            .unwrap_err()
            .is_item_not_found());
    }

    #[tokio::test]
    async fn query_filters_orders_and_slices() {
        let store = provisioned().await;
        for (id, stock, name) in [("a", 3, "Chew Toy"), ("b", 12, "Rope"), ("c", 5, "Toy Mouse"), ("d", 1, "toy box")] {
            store.create_item(&target(), json!({"id": id, "stock": stock, "name": name})).await.unwrap();
        }
        let spec = QuerySpec {
            filter: vec![
                Predicate::Contains { field: "name".into(), param: "@search".into() },
                Predicate::Compare { field: "stock".into(), op: CompareOp::Lt, operand: Operand::Literal(json!(10)) },
            ],
            order_by: Some(OrderBy { field: "stock".into(), descending: true }),
            slice: Some(Slice { offset: Operand::Param("@offset".into()), limit: Operand::Param("@limit".into()) }),
            parameters: vec![
                QueryParam { name: "@search".into(), value: json!("Toy") },
                QueryParam { name: "@offset".into(), value: json!(0) },
                QueryParam { name: "@limit".into(), value: json!(10) },
            ],
            ..Default::default()
        };
        let rows = store.query_items(&target(), &spec, &QueryOptions::cross_partition(None)).await.unwrap();
        let ids: Vec<&str> = rows.iter().filter_map(|r| r["id"].as_str()).collect();
        assert_eq!(ids, ["c", "a"]);

        let rows = store.query_items(&target(), &QuerySpec::existence(), &QueryOptions::cross_partition(None)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].as_object().map(|o| o.len()), Some(1));
    }

    #[tokio::test]
    async fn rejects_query_without_cross_partition() {
        let store = provisioned().await;
        let err = store.query_items(&target(), &QuerySpec::default(), &QueryOptions::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::BadRequest(_)));
    }

    #[tokio::test]
    async fn unbound_parameter_is_bad_request() {
        let store = provisioned().await;
        store.create_item(&target(), json!({"id": "a", "name": "x"})).await.unwrap();
        let spec = QuerySpec {
            filter: vec![Predicate::Contains { field: "name".into(), param: "@missing".into() }],
            ..Default::default()
        };
        let err = store.query_items(&target(), &spec, &QueryOptions::cross_partition(None)).await.unwrap_err();
        assert!(matches!(err, StoreError::BadRequest(_)));
    }

    #[tokio::test]
    async fn snapshot_persists_across_reopen() -> Result<(), anyhow::Error> {
        let tmp = std::env::temp_dir().join(format!("memory_store_{}.json", uuid::Uuid::new_v4()));
        {
            let store = MemoryStore::open(&tmp).await;
            store.create_database_if_not_exists("testdb").await?;
            let spec = ContainerSpec { id: "things".into(), partition_key_path: PARTITION_KEY_PATH.into(), throughput: 400 };
            store.create_container_if_not_exists("testdb", &spec).await?;
            store.create_item(&target(), json!({"id": "a"})).await?;
        }
        let reopened = MemoryStore::open(&tmp).await;
        assert_eq!(reopened.document_count(&target()).await, Some(1));
        assert!(reopened.drop_database("testdb").await?);
        assert_eq!(reopened.document_count(&target()).await, None);

        let _ = tokio::fs::remove_file(&tmp).await;
        Ok(())
    }

    #[tokio::test]
    async fn failed_snapshot_write_leaves_no_trace() {
        // a directory cannot be written as a file
        let dir = std::env::temp_dir().join(format!("memory_store_dir_{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let store = MemoryStore::open(&dir).await;

        for _ in 0..2 {
            let err = store.create_database_if_not_exists("testdb").await.unwrap_err();
            assert!(matches!(err, StoreError::Unavailable(_)));
        }
        assert!(matches!(store.read_database("testdb").await, Err(StoreError::NotFound { .. })));

        let spec = ContainerSpec { id: "things".into(), partition_key_path: PARTITION_KEY_PATH.into(), throughput: 400 };
        let memory = MemoryStore::new();
        memory.create_database_if_not_exists("testdb").await.unwrap();
        memory.create_container_if_not_exists("testdb", &spec).await.unwrap();
        let seeded = MemoryStore {
            inner: RwLock::new(memory.inner.read().await.clone()),
            file_path: Some(dir.clone()),
        };
        for _ in 0..2 {
            let err = seeded.create_item(&target(), json!({"id": "a"})).await.unwrap_err();
            assert!(matches!(err, StoreError::Unavailable(_)));
        }
        assert_eq!(seeded.document_count(&target()).await, Some(0));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
