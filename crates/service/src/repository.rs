use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use models::Document;
use serde_json::Value;
use tracing::warn;

use crate::errors::ServiceError;
use crate::lifecycle::{HealthReport, StoreLifecycle};
use crate::metrics::{SEARCH_ROWS_SKIPPED_TOTAL, STORE_ERRORS_TOTAL, STORE_OPERATIONS_TOTAL, STORE_OP_DURATION};
use crate::store::{QueryOptions, QuerySpec, StoreError};

/// Persistence port for one record type. Absent records are `None`/`false`,
/// never errors.
#[async_trait]
pub trait DocumentRepository<E: Document>: Send + Sync {
    /// Connect and provision if needed, without touching any record.
    async fn ready(&self) -> Result<(), ServiceError>;
    async fn insert(&self, record: &E) -> Result<E, ServiceError>;
    async fn find(&self, id: &str) -> Result<Option<E>, ServiceError>;
    /// Full-document replace. `None` if the record disappeared meanwhile.
    async fn replace(&self, record: &E) -> Result<Option<E>, ServiceError>;
    async fn remove(&self, id: &str) -> Result<bool, ServiceError>;
    /// Rows that fail to decode are skipped.
    async fn query(&self, spec: &QuerySpec, max_items: u32) -> Result<Vec<E>, ServiceError>;
    async fn health(&self) -> HealthReport;
}

/// Document-store implementation; the id doubles as the partition key.
pub struct StoreRepository<E: Document> {
    lifecycle: Arc<StoreLifecycle<E>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Document> StoreRepository<E> {
    pub fn new(lifecycle: Arc<StoreLifecycle<E>>) -> Self { Self { lifecycle, _entity: PhantomData } }

    pub fn lifecycle(&self) -> &Arc<StoreLifecycle<E>> { &self.lifecycle }

    async fn observed<T, Fut>(&self, op: &'static str, fut: Fut) -> Result<T, ServiceError>
    where
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let labels = [E::KIND, op];
        STORE_OPERATIONS_TOTAL.with_label_values(&labels).inc();
        let started = Instant::now();
        let result = fut.await;
        STORE_OP_DURATION.with_label_values(&labels).observe(started.elapsed().as_secs_f64());
        if result.is_err() {
            STORE_ERRORS_TOTAL.with_label_values(&labels).inc();
        }
        result
    }
}

fn decode<E: Document>(doc: Value) -> Result<E, ServiceError> { Ok(serde_json::from_value(doc)?) }

#[async_trait]
impl<E: Document> DocumentRepository<E> for StoreRepository<E> {
    async fn ready(&self) -> Result<(), ServiceError> { self.lifecycle.ensure_ready().await.map(|_| ()) }

    async fn insert(&self, record: &E) -> Result<E, ServiceError> {
        let doc = serde_json::to_value(record)?;
        let id = record.id();
        let stored = self
            .observed("create", async {
                self.lifecycle
                    .run(|h| {
                        let doc = doc.clone();
                        async move { h.store.create_item(&h.target, doc).await }
                    })
                    .await
            })
            .await
            .map_err(|e| match e {
                ServiceError::Store(StoreError::Conflict(_)) => ServiceError::already_exists(E::KIND, id),
                other => other,
            })?;
        decode(stored)
    }

    async fn find(&self, id: &str) -> Result<Option<E>, ServiceError> {
        let found = self
            .observed("read", async {
                self.lifecycle.run(|h| async move { h.store.read_item(&h.target, id, id).await }).await
            })
            .await;
        match found {
            Ok(doc) => decode(doc).map(Some),
            Err(ServiceError::Store(e)) if e.is_item_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn replace(&self, record: &E) -> Result<Option<E>, ServiceError> {
        let doc = serde_json::to_value(record)?;
        let id = record.id();
        let replaced = self
            .observed("replace", async {
                self.lifecycle
                    .run(|h| {
                        let doc = doc.clone();
                        async move { h.store.replace_item(&h.target, id, doc).await }
                    })
                    .await
            })
            .await;
        match replaced {
            Ok(doc) => decode(doc).map(Some),
            Err(ServiceError::Store(e)) if e.is_item_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn remove(&self, id: &str) -> Result<bool, ServiceError> {
        let removed = self
            .observed("delete", async {
                self.lifecycle.run(|h| async move { h.store.delete_item(&h.target, id, id).await }).await
            })
            .await;
        match removed {
            Ok(()) => Ok(true),
            Err(ServiceError::Store(e)) if e.is_item_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn query(&self, spec: &QuerySpec, max_items: u32) -> Result<Vec<E>, ServiceError> {
        let options = QueryOptions::cross_partition(Some(max_items));
        let rows = self
            .observed("query", async {
                self.lifecycle
                    .run(|h| {
                        let options = options.clone();
                        async move { h.store.query_items(&h.target, spec, &options).await }
                    })
                    .await
            })
            .await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.get("id").and_then(Value::as_str).unwrap_or("<no id>").to_string();
            match serde_json::from_value::<E>(row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(entity = E::KIND, id = %id, error = %e, "skipping row that failed to decode");
                    SEARCH_ROWS_SKIPPED_TOTAL.with_label_values(&[E::KIND]).inc();
                }
            }
        }
        Ok(records)
    }

    async fn health(&self) -> HealthReport { self.lifecycle.health().await }
}
