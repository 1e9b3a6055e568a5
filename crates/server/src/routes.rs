pub mod crud;

use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use common::types::ServiceInfo;
use serde_json::json;
use service::search::Searchable;
use service::EntityService;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, Level};

use crate::state::AppState;

async fn info(State(info): State<Arc<ServiceInfo>>) -> Json<ServiceInfo> { Json(info.as_ref().clone()) }

/// 200 when every collection answers its reachability check, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (pets, activities, accessories) =
        tokio::join!(state.pets.health(), state.activities.health(), state.accessories.health());
    let healthy = pets.is_healthy() && activities.is_healthy() && accessories.is_healthy();
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "version": state.info.version,
        "services": { "pets": pets, "activities": activities, "accessories": accessories },
    });
    (status, Json(body))
}

async fn metrics() -> impl IntoResponse {
    match service::metrics::encode_metrics() {
        Ok(text) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `/api/{name}` and `/api/{name}/:id` backed by one entity service.
fn entity_routes<E>(name: &str) -> Router<AppState>
where
    E: Searchable,
    Arc<EntityService<E>>: FromRef<AppState>,
{
    Router::new()
        .route(&format!("/api/{name}"), get(crud::list::<E>).post(crud::create::<E>))
        .route(
            &format!("/api/{name}/:id"),
            get(crud::fetch::<E>).patch(crud::update::<E>).delete(crud::remove::<E>),
        )
}

/// Build the full application router.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(info))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .merge(entity_routes::<models::pet::Pet>("pets"))
        .merge(entity_routes::<models::activity::Activity>("activities"))
        .merge(entity_routes::<models::accessory::Accessory>("accessories"))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
