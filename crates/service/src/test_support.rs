#![cfg(test)]
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::entity_service::EntityService;
use crate::lifecycle::StoreSettings;
use crate::search::Searchable;
use crate::store::{
    ContainerRef, ContainerSpec, Credential, DocumentStore, MemoryStore, QueryOptions, QuerySpec, StoreConnector,
    StoreError,
};

pub fn settings(database: &str, container: &str) -> StoreSettings {
    StoreSettings {
        endpoint: "http://localhost:8081".into(),
        key: "test-key".into(),
        target: ContainerRef::new(database, container),
        throughput: 400,
        connect_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(5),
        seed_when_empty: false,
    }
}

/// Connector that always returns the same client.
pub struct FixedConnector {
    store: Arc<dyn DocumentStore>,
}

impl FixedConnector {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self { Self { store } }
}

#[async_trait]
impl StoreConnector for FixedConnector {
    async fn connect(&self, _endpoint: &str, _credential: &Credential) -> Result<Arc<dyn DocumentStore>, StoreError> {
        Ok(self.store.clone())
    }
}

/// Wraps a store to count calls, inject one failure, or slow every call down.
pub struct RecordingStore {
    inner: Arc<dyn DocumentStore>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failure: Mutex<Option<StoreError>>,
    delay: Option<Duration>,
}

impl RecordingStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self { inner, calls: Mutex::new(HashMap::new()), failure: Mutex::new(None), delay: None }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_next(&self, err: StoreError) { *self.failure.lock().unwrap() = Some(err); }

    pub fn calls(&self, op: &str) -> usize { self.calls.lock().unwrap().get(op).copied().unwrap_or(0) }

    async fn enter(&self, op: &'static str) -> Result<(), StoreError> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failure.lock().unwrap().take();
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn read_database(&self, database: &str) -> Result<(), StoreError> {
        self.enter("read_database").await?;
        self.inner.read_database(database).await
    }

    async fn read_container(&self, target: &ContainerRef) -> Result<(), StoreError> {
        self.enter("read_container").await?;
        self.inner.read_container(target).await
    }

    async fn create_database_if_not_exists(&self, database: &str) -> Result<bool, StoreError> {
        self.enter("create_database_if_not_exists").await?;
        self.inner.create_database_if_not_exists(database).await
    }

    async fn create_container_if_not_exists(&self, database: &str, spec: &ContainerSpec) -> Result<bool, StoreError> {
        self.enter("create_container_if_not_exists").await?;
        self.inner.create_container_if_not_exists(database, spec).await
    }

    async fn create_item(&self, target: &ContainerRef, document: Value) -> Result<Value, StoreError> {
        self.enter("create_item").await?;
        self.inner.create_item(target, document).await
    }

    async fn read_item(&self, target: &ContainerRef, id: &str, partition_key: &str) -> Result<Value, StoreError> {
        self.enter("read_item").await?;
        self.inner.read_item(target, id, partition_key).await
    }

    async fn replace_item(&self, target: &ContainerRef, id: &str, document: Value) -> Result<Value, StoreError> {
        self.enter("replace_item").await?;
        self.inner.replace_item(target, id, document).await
    }

    async fn delete_item(&self, target: &ContainerRef, id: &str, partition_key: &str) -> Result<(), StoreError> {
        self.enter("delete_item").await?;
        self.inner.delete_item(target, id, partition_key).await
    }

    async fn query_items(&self, target: &ContainerRef, query: &QuerySpec, options: &QueryOptions) -> Result<Vec<Value>, StoreError> {
        self.enter("query_items").await?;
        self.inner.query_items(target, query, options).await
    }
}

/// A service over a fresh in-memory store, plus the store for inspection.
pub fn memory_service<E: Searchable>(database: &str, container: &str) -> (EntityService<E>, Arc<MemoryStore>) {
    let memory = Arc::new(MemoryStore::new());
    let service = EntityService::connect(settings(database, container), Arc::new(FixedConnector::new(memory.clone())));
    (service, memory)
}

/// A service over a [`RecordingStore`] wrapping a fresh in-memory store.
pub fn recorded_service<E: Searchable>(database: &str, container: &str) -> (EntityService<E>, Arc<RecordingStore>) {
    let recorder = Arc::new(RecordingStore::new(Arc::new(MemoryStore::new())));
    let service = EntityService::connect(settings(database, container), Arc::new(FixedConnector::new(recorder.clone())));
    (service, recorder)
}
