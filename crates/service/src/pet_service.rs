use models::pet::{Pet, Species};
use serde::Deserialize;
use tracing::debug;

use crate::entity_service::EntityService;
use crate::errors::ServiceError;
use crate::search::{non_empty, Page, QueryBuilder, SearchFilter, Searchable};

pub type PetService = EntityService<Pet>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetFilter {
    /// Substring of `name` or `notes`.
    pub search: Option<String>,
    pub species: Option<Species>,
    /// Accepted for client compatibility; not applied.
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl SearchFilter for PetFilter {
    fn page(&self) -> Result<Page, ServiceError> { Page::try_new(self.limit, self.offset) }

    fn apply(&self, query: &mut QueryBuilder) {
        if let Some(text) = non_empty(&self.search) {
            query.contains_any(&["name", "notes"], "search", text);
        }
        if let Some(species) = self.species {
            query.equals("species", "species", species.as_str());
        }
        if let Some(status) = &self.status {
            debug!(status = %status, "pet status filter is not applied");
        }
    }
}

impl Searchable for Pet {
    type Filter = PetFilter;
}
