use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{Credential, DocumentStore, MemoryStore, StoreError};

/// Produces a client for an endpoint. Called once per successful lifecycle initialization.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, endpoint: &str, credential: &Credential) -> Result<Arc<dyn DocumentStore>, StoreError>;
}

/// Hands out one shared [`MemoryStore`] whatever the endpoint or credential.
#[derive(Clone)]
pub struct LocalConnector {
    store: Arc<MemoryStore>,
}

impl LocalConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self { Self { store } }

    /// Snapshot-backed when `data_file` is set, purely in-memory otherwise.
    pub async fn from_data_file(data_file: Option<&str>) -> Self {
        let store = match data_file {
            Some(path) => MemoryStore::open(path).await,
            None => MemoryStore::new(),
        };
        Self::new(Arc::new(store))
    }

    pub fn store(&self) -> Arc<MemoryStore> { self.store.clone() }
}

#[async_trait]
impl StoreConnector for LocalConnector {
    async fn connect(&self, endpoint: &str, credential: &Credential) -> Result<Arc<dyn DocumentStore>, StoreError> {
        info!(endpoint, credential = credential.kind(), "connected to local document store");
        Ok(self.store.clone())
    }
}
