use models::activity::{Activity, ActivityType};
use models::Timestamp;
use serde::Deserialize;

use crate::entity_service::EntityService;
use crate::errors::ServiceError;
use crate::search::{non_empty, Page, QueryBuilder, SearchFilter, Searchable};
use crate::store::CompareOp;

pub type ActivityService = EntityService<Activity>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFilter {
    pub pet_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ActivityType>,
    /// Inclusive lower bound on `timestamp`.
    pub from: Option<Timestamp>,
    /// Inclusive upper bound on `timestamp`.
    pub to: Option<Timestamp>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl SearchFilter for ActivityFilter {
    fn page(&self) -> Result<Page, ServiceError> { Page::try_new(self.limit, self.offset) }

    // Timestamps are stored fixed-width, so string comparison orders by time.
    fn apply(&self, query: &mut QueryBuilder) {
        if let Some(pet_id) = non_empty(&self.pet_id) {
            query.equals("petId", "petId", pet_id);
        }
        if let Some(kind) = self.kind {
            query.equals("type", "type", kind.as_str());
        }
        if let Some(from) = self.from {
            query.compare("timestamp", CompareOp::Ge, "from", from.to_iso());
        }
        if let Some(to) = self.to {
            query.compare("timestamp", CompareOp::Le, "to", to.to_iso());
        }
    }
}

impl Searchable for Activity {
    type Filter = ActivityFilter;
}
