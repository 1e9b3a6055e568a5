//! Service layer: document-backed CRUD and search for pets, activities and accessories.
//! - `store` is the outbound seam to the document database, plus a bundled local backend.
//! - `lifecycle` owns the lazy connection and self-healing schema provisioning.
//! - `entity_service` is the generic CRUD/search service, instantiated per record type.

pub mod errors;
pub mod store;
pub mod lifecycle;
pub mod search;
pub mod repository;
pub mod entity_service;
pub mod pet_service;
pub mod activity_service;
pub mod accessory_service;
pub mod metrics;
#[cfg(test)]
pub mod test_support;

pub use accessory_service::{AccessoryFilter, AccessoryService};
pub use activity_service::{ActivityFilter, ActivityService};
pub use entity_service::EntityService;
pub use errors::ServiceError;
pub use lifecycle::{HealthReport, HealthStatus, LifecycleState, StoreSettings};
pub use pet_service::{PetFilter, PetService};
