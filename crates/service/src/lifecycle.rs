//! Lazy connection to one container, with self-healing schema.
//!
//! Nothing touches the store until the first operation. Initialization
//! selects a credential, connects, and looks up the database and container.
//! A missing database or container is provisioned on the spot (create both
//! if absent, then write the entity's sample records) and the lookup is
//! considered done. Operations that later hit a missing schema provision
//! and retry exactly once.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use configs::{CollectionConfig, StoreConfig};
use models::{Document, Timestamp};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::ServiceError;
use crate::metrics::PROVISIONING_TOTAL;
use crate::store::{
    select_credential, ContainerRef, ContainerSpec, Credential, DocumentStore, QueryOptions, QuerySpec,
    StoreConnector, StoreError, PARTITION_KEY_PATH,
};

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub endpoint: String,
    pub key: String,
    pub target: ContainerRef,
    pub throughput: u32,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Seed an existing but empty container when a health check finds it.
    pub seed_when_empty: bool,
}

impl StoreSettings {
    pub fn from_config(store: &StoreConfig, collection: &CollectionConfig) -> Self {
        Self {
            endpoint: store.endpoint.clone(),
            key: store.key.clone(),
            target: ContainerRef::new(&collection.database, &collection.container),
            throughput: store.throughput,
            connect_timeout: Duration::from_secs(store.connect_timeout_secs),
            request_timeout: Duration::from_secs(store.request_timeout_secs),
            seed_when_empty: store.seed_when_empty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Provisioning,
    Ready,
}

impl LifecycleState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Initializing,
            2 => Self::Provisioning,
            3 => Self::Ready,
            _ => Self::Uninitialized,
        }
    }
}

/// Everything an operation needs once the lifecycle is ready.
pub struct StoreHandle {
    pub store: Arc<dyn DocumentStore>,
    pub target: ContainerRef,
    pub credential: Credential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub database: String,
    pub container: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool { self.status == HealthStatus::Healthy }
}

pub struct StoreLifecycle<E: Document> {
    settings: StoreSettings,
    connector: Arc<dyn StoreConnector>,
    handle: ArcSwapOption<StoreHandle>,
    state: AtomicU8,
    init_lock: Mutex<()>,
    provision_lock: Mutex<()>,
    // bumped after each completed provisioning pass
    epoch: AtomicU64,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Document> StoreLifecycle<E> {
    pub fn new(settings: StoreSettings, connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            settings,
            connector,
            handle: ArcSwapOption::empty(),
            state: AtomicU8::new(LifecycleState::Uninitialized as u8),
            init_lock: Mutex::new(()),
            provision_lock: Mutex::new(()),
            epoch: AtomicU64::new(0),
            _entity: PhantomData,
        }
    }

    pub fn settings(&self) -> &StoreSettings { &self.settings }

    pub fn state(&self) -> LifecycleState { LifecycleState::from_u8(self.state.load(Ordering::Acquire)) }

    fn set_state(&self, state: LifecycleState) { self.state.store(state as u8, Ordering::Release); }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        let limit = self.settings.request_timeout;
        tokio::time::timeout(limit, fut).await.map_err(|_| StoreError::Timeout(limit))?
    }

    /// Returns the ready handle, initializing on first use. Concurrent
    /// callers wait on the same initialization instead of racing their own.
    pub async fn ensure_ready(&self) -> Result<Arc<StoreHandle>, ServiceError> {
        if let Some(handle) = self.handle.load_full() {
            return Ok(handle);
        }
        let _guard = self.init_lock.lock().await;
        if let Some(handle) = self.handle.load_full() {
            return Ok(handle);
        }
        self.set_state(LifecycleState::Initializing);
        match self.initialize().await {
            Ok(handle) => {
                self.handle.store(Some(handle.clone()));
                self.set_state(LifecycleState::Ready);
                Ok(handle)
            }
            Err(e) => {
                warn!(entity = E::KIND, error = %e, "store initialization failed");
                self.set_state(LifecycleState::Uninitialized);
                Err(e)
            }
        }
    }

    async fn initialize(&self) -> Result<Arc<StoreHandle>, ServiceError> {
        let credential = select_credential(&self.settings.endpoint, &self.settings.key)?;
        let connect_timeout = self.settings.connect_timeout;
        let store = tokio::time::timeout(connect_timeout, self.connector.connect(&self.settings.endpoint, &credential))
            .await
            .map_err(|_| StoreError::Timeout(connect_timeout))??;
        let handle = Arc::new(StoreHandle { store, target: self.settings.target.clone(), credential });

        let epoch = self.epoch.load(Ordering::Acquire);
        match self.lookup(&handle).await {
            Ok(()) => {}
            Err(e) if e.is_schema_not_found() => {
                info!(entity = E::KIND, error = %e, "schema missing at startup");
                self.provision(&handle, epoch).await?;
            }
            Err(e) => return Err(e.into()),
        }
        info!(
            entity = E::KIND,
            database = %handle.target.database,
            container = %handle.target.container,
            credential = handle.credential.kind(),
            "document store ready"
        );
        Ok(handle)
    }

    async fn lookup(&self, handle: &StoreHandle) -> Result<(), StoreError> {
        self.bounded(handle.store.read_database(&handle.target.database)).await?;
        self.bounded(handle.store.read_container(&handle.target)).await
    }

    /// Create database and container if absent, then seed. Callers pass the
    /// epoch they saw before their store call failed; if another caller has
    /// completed a pass since, this one is skipped.
    async fn provision(&self, handle: &StoreHandle, observed_epoch: u64) -> Result<(), ServiceError> {
        let _guard = self.provision_lock.lock().await;
        if self.epoch.load(Ordering::Acquire) != observed_epoch {
            debug!(entity = E::KIND, "schema already provisioned by a concurrent caller");
            return Ok(());
        }
        let resume = self.state();
        self.set_state(LifecycleState::Provisioning);
        let result = self.provision_schema(handle).await;
        self.set_state(resume);
        result?;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        PROVISIONING_TOTAL.with_label_values(&[E::KIND]).inc();
        Ok(())
    }

    async fn provision_schema(&self, handle: &StoreHandle) -> Result<(), ServiceError> {
        let target = &handle.target;
        let created_db = self.bounded(handle.store.create_database_if_not_exists(&target.database)).await?;
        let spec = ContainerSpec {
            id: target.container.clone(),
            partition_key_path: PARTITION_KEY_PATH.to_string(),
            throughput: self.settings.throughput,
        };
        let created_container =
            self.bounded(handle.store.create_container_if_not_exists(&target.database, &spec)).await?;
        info!(
            entity = E::KIND,
            database = %target.database,
            container = %target.container,
            created_db,
            created_container,
            "provisioned schema"
        );
        self.seed(handle).await?;
        Ok(())
    }

    /// Write the sample records. Ids that already exist are left alone.
    async fn seed(&self, handle: &StoreHandle) -> Result<usize, ServiceError> {
        let mut written = 0;
        for sample in E::samples(Timestamp::now()) {
            let doc = serde_json::to_value(&sample)?;
            match self.bounded(handle.store.create_item(&handle.target, doc)).await {
                Ok(_) => written += 1,
                Err(StoreError::Conflict(_)) => debug!(entity = E::KIND, id = sample.id(), "sample already present"),
                Err(e) => return Err(e.into()),
            }
        }
        info!(entity = E::KIND, count = written, "seeded sample records");
        Ok(written)
    }

    /// Run one store call against the ready handle, bounded by the request
    /// timeout. A missing database or container triggers provisioning and a
    /// single retry; every other error is returned as is.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, ServiceError>
    where
        F: Fn(Arc<StoreHandle>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let handle = self.ensure_ready().await?;
        let epoch = self.epoch.load(Ordering::Acquire);
        match self.bounded(op(handle.clone())).await {
            Err(e) if e.is_schema_not_found() => {
                warn!(entity = E::KIND, error = %e, "schema missing; provisioning before retry");
                self.provision(&handle, epoch).await?;
                Ok(self.bounded(op(handle)).await?)
            }
            other => Ok(other?),
        }
    }

    /// Cheap reachability check. Never fails; problems are reported in the body.
    pub async fn health(&self) -> HealthReport {
        let mut report = HealthReport {
            status: HealthStatus::Healthy,
            database: self.settings.target.database.clone(),
            container: self.settings.target.container.clone(),
            credential: None,
            message: None,
            error: None,
        };
        let check = QuerySpec::existence();
        let rows = self
            .run(|h| {
                let check = check.clone();
                async move { h.store.query_items(&h.target, &check, &QueryOptions::cross_partition(Some(1))).await }
            })
            .await;
        report.credential = self.handle.load_full().map(|h| h.credential.kind());
        match rows {
            Ok(rows) if rows.is_empty() && self.settings.seed_when_empty => {
                let seeded = match self.handle.load_full() {
                    Some(handle) => self.seed(&handle).await,
                    None => Ok(0),
                };
                match seeded {
                    Ok(n) => report.message = Some(format!("seeded {n} sample records into empty container")),
                    Err(e) => {
                        report.status = HealthStatus::Unhealthy;
                        report.error = Some(e.to_string());
                    }
                }
            }
            Ok(rows) if rows.is_empty() => report.message = Some("container is empty".into()),
            Ok(_) => report.message = Some("connected".into()),
            Err(e) => {
                report.status = HealthStatus::Unhealthy;
                report.error = Some(e.to_string());
            }
        }
        report
    }
}
