use std::marker::PhantomData;
use std::sync::Arc;

use models::{Changeset, Timestamp, Validate};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::lifecycle::{HealthReport, StoreLifecycle, StoreSettings};
use crate::repository::{DocumentRepository, StoreRepository};
use crate::search::{QueryBuilder, SearchFilter, Searchable};
use crate::store::StoreConnector;

/// CRUD and search for one record type.
///
/// Construct one per entity at startup and share it; the underlying store
/// connection is opened on first use.
pub struct EntityService<E: Searchable, R: DocumentRepository<E> = StoreRepository<E>> {
    repo: Arc<R>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Searchable> EntityService<E> {
    pub fn connect(settings: StoreSettings, connector: Arc<dyn StoreConnector>) -> Self {
        let lifecycle = Arc::new(StoreLifecycle::new(settings, connector));
        Self::new(Arc::new(StoreRepository::new(lifecycle)))
    }
}

impl<E: Searchable, R: DocumentRepository<E>> EntityService<E, R> {
    pub fn new(repo: Arc<R>) -> Self { Self { repo, _entity: PhantomData } }

    pub fn repository(&self) -> &Arc<R> { &self.repo }

    /// Assigns a fresh id and stamps `createdAt == updatedAt`. The store is
    /// made ready first, so the stamp is never older than freshly seeded rows.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use models::pet::{NewPet, Pet, Species};
    /// use service::entity_service::EntityService;
    /// use service::lifecycle::StoreSettings;
    /// use service::store::{ContainerRef, LocalConnector, MemoryStore};
    ///
    /// let settings = StoreSettings {
    ///     endpoint: "http://localhost:8081".into(),
    ///     key: String::new(),
    ///     target: ContainerRef::new("petservice", "pets"),
    ///     throughput: 400,
    ///     connect_timeout: Duration::from_secs(5),
    ///     request_timeout: Duration::from_secs(5),
    ///     seed_when_empty: false,
    /// };
    /// let connector = LocalConnector::new(Arc::new(MemoryStore::new()));
    /// let pets: EntityService<Pet> = EntityService::connect(settings, Arc::new(connector));
    ///
    /// let rex = tokio_test::block_on(pets.create(NewPet {
    ///     name: "Rex".into(),
    ///     species: Species::Dog,
    ///     age_years: 2,
    ///     health: 90,
    ///     happiness: 80,
    ///     energy: 70,
    ///     avatar_url: None,
    ///     notes: None,
    /// }))
    /// .unwrap();
    /// assert!(!rex.id.is_empty());
    /// assert_eq!(rex.created_at, rex.updated_at);
    /// ```
    #[instrument(skip_all, fields(entity = E::KIND))]
    pub async fn create(&self, input: E::Create) -> Result<E, ServiceError> {
        input.validate()?;
        self.repo.ready().await?;
        let record = E::from_input(input, Uuid::new_v4().to_string(), Timestamp::now());
        let stored = self.repo.insert(&record).await?;
        info!(id = stored.id(), "created");
        Ok(stored)
    }

    #[instrument(skip(self), fields(entity = E::KIND))]
    pub async fn get(&self, id: &str) -> Result<Option<E>, ServiceError> { self.repo.find(id).await }

    /// Merge the supplied fields and replace the stored document. An empty
    /// change set returns the stored record untouched, without a write.
    #[instrument(skip(self, changes), fields(entity = E::KIND))]
    pub async fn update(&self, id: &str, changes: E::Update) -> Result<Option<E>, ServiceError> {
        changes.validate()?;
        let Some(mut current) = self.repo.find(id).await? else {
            return Ok(None);
        };
        if changes.is_empty() {
            debug!("empty change set; nothing to write");
            return Ok(Some(current));
        }
        let previous = current.updated_at();
        current.apply(changes)?;
        current.touch(Timestamp::advance_from(previous));
        let updated = self.repo.replace(&current).await?;
        if updated.is_some() {
            info!("updated");
        }
        Ok(updated)
    }

    #[instrument(skip(self), fields(entity = E::KIND))]
    pub async fn delete(&self, id: &str) -> Result<bool, ServiceError> {
        let removed = self.repo.remove(id).await?;
        if removed {
            info!("deleted");
        }
        Ok(removed)
    }

    #[instrument(skip_all, fields(entity = E::KIND))]
    pub async fn search(&self, filter: &E::Filter) -> Result<Vec<E>, ServiceError> {
        let page = filter.page()?;
        let mut query = QueryBuilder::new();
        filter.apply(&mut query);
        let spec = query.build(E::ORDER_FIELD, page);
        debug!(query = %spec.text(), "search");
        let rows = self.repo.query(&spec, page.limit()).await?;
        debug!(count = rows.len(), "search done");
        Ok(rows)
    }

    pub async fn health(&self) -> HealthReport { self.repo.health().await }
}
