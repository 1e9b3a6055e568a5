use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use common::types::ServiceInfo;
use configs::{AppConfig, StoreBackend};
use service::store::{CosmosConnector, LocalConnector, StoreConnector};
use service::{EntityService, StoreSettings};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::routes;
use crate::state::AppState;

pub const APP_NAME: &str = "PetPal API";

fn build_cors() -> CorsLayer { CorsLayer::very_permissive() }

/// Wire one service per collection over a shared connector. No store call is
/// made here; each collection connects and provisions on first use.
pub fn build_state_with(cfg: &AppConfig, connector: Arc<dyn StoreConnector>) -> AppState {
    let store = &cfg.store;
    AppState {
        pets: Arc::new(EntityService::connect(StoreSettings::from_config(store, &store.pets), connector.clone())),
        activities: Arc::new(EntityService::connect(
            StoreSettings::from_config(store, &store.activities),
            connector.clone(),
        )),
        accessories: Arc::new(EntityService::connect(StoreSettings::from_config(store, &store.accessories), connector)),
        info: Arc::new(ServiceInfo::new(APP_NAME, env!("CARGO_PKG_VERSION"))),
    }
}

/// Connector for the configured backend.
pub async fn build_connector(cfg: &AppConfig) -> Arc<dyn StoreConnector> {
    let store = &cfg.store;
    match store.backend {
        StoreBackend::Local => Arc::new(LocalConnector::from_data_file(store.data_file.as_deref()).await),
        StoreBackend::Cosmos => Arc::new(CosmosConnector::new(
            Duration::from_secs(store.connect_timeout_secs),
            Duration::from_secs(store.request_timeout_secs),
        )),
    }
}

pub async fn build_state(cfg: &AppConfig) -> AppState { build_state_with(cfg, build_connector(cfg).await) }

pub async fn build_app(cfg: &AppConfig) -> Router { routes::build_router(build_state(cfg).await, build_cors()) }

/// Public entry: build the app and run the HTTP server
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let app = build_app(&cfg).await;
    let listener = TcpListener::bind((cfg.server.host.as_str(), cfg.server.port)).await?;
    info!(addr = %listener.local_addr()?, backend = ?cfg.store.backend, endpoint = %cfg.store.endpoint, "starting server");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use service::LifecycleState;

    #[tokio::test]
    async fn state_is_lazy_and_uses_configured_collections() {
        let mut cfg = AppConfig::default();
        cfg.store.accessories = configs::CollectionConfig::new("shop", "gear");
        let state = build_state(&cfg).await;

        let lifecycle = state.accessories.repository().lifecycle();
        assert_eq!(lifecycle.state(), LifecycleState::Uninitialized);
        assert_eq!(lifecycle.settings().target.to_string(), "shop/gear");
        assert_eq!(state.info.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn cosmos_backend_connects_over_rest() {
        let mut cfg = AppConfig::default();
        cfg.store.backend = StoreBackend::Cosmos;
        // nothing listens here; the connector must not touch the network
        cfg.store.endpoint = "https://127.0.0.1:1".into();
        cfg.store.key = "cGV0cGFsLWVtdWxhdG9yLXRlc3Qta2V5".into();
        let connector = build_connector(&cfg).await;
        let store = connector.connect(&cfg.store.endpoint, &service::store::Credential::Key(cfg.store.key.clone())).await;
        assert!(store.is_ok());

        // requests really go to the endpoint, which refuses them
        let state = build_state(&cfg).await;
        assert!(!state.pets.health().await.is_healthy());
        assert!(build_state(&AppConfig::default()).await.pets.health().await.is_healthy());
    }
}
