use std::sync::Arc;

use axum::extract::FromRef;
use common::types::ServiceInfo;
use service::{AccessoryService, ActivityService, PetService};

/// Services shared by all handlers, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub pets: Arc<PetService>,
    pub activities: Arc<ActivityService>,
    pub accessories: Arc<AccessoryService>,
    pub info: Arc<ServiceInfo>,
}

impl FromRef<AppState> for Arc<PetService> {
    fn from_ref(state: &AppState) -> Self { state.pets.clone() }
}

impl FromRef<AppState> for Arc<ActivityService> {
    fn from_ref(state: &AppState) -> Self { state.activities.clone() }
}

impl FromRef<AppState> for Arc<AccessoryService> {
    fn from_ref(state: &AppState) -> Self { state.accessories.clone() }
}

impl FromRef<AppState> for Arc<ServiceInfo> {
    fn from_ref(state: &AppState) -> Self { state.info.clone() }
}
