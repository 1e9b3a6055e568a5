use models::accessory::{Accessory, AccessoryType};
use serde::Deserialize;

use crate::entity_service::EntityService;
use crate::errors::ServiceError;
use crate::search::{non_empty, Page, QueryBuilder, SearchFilter, Searchable};
use crate::store::CompareOp;

pub type AccessoryService = EntityService<Accessory>;

/// Stock below this counts as low.
pub const LOW_STOCK_THRESHOLD: i64 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryFilter {
    /// Substring of `name` or `description`.
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<AccessoryType>,
    pub low_stock_only: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl SearchFilter for AccessoryFilter {
    fn page(&self) -> Result<Page, ServiceError> { Page::try_new(self.limit, self.offset) }

    fn apply(&self, query: &mut QueryBuilder) {
        if let Some(text) = non_empty(&self.search) {
            query.contains_any(&["name", "description"], "search", text);
        }
        if let Some(kind) = self.kind {
            query.equals("type", "type", kind.as_str());
        }
        if self.low_stock_only == Some(true) {
            query.compare_constant("stock", CompareOp::Lt, LOW_STOCK_THRESHOLD);
        }
    }
}

impl Searchable for Accessory {
    type Filter = AccessoryFilter;
}
