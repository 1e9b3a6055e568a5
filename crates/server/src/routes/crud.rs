//! Generic CRUD handlers, instantiated once per entity type.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use service::search::Searchable;
use service::EntityService;

use crate::errors::JsonApiError;
use crate::extract::{ApiJson, ApiQuery};

type Service<E> = State<Arc<EntityService<E>>>;

pub async fn list<E: Searchable>(
    State(svc): Service<E>,
    ApiQuery(filter): ApiQuery<E::Filter>,
) -> Result<Json<Vec<E>>, JsonApiError> {
    Ok(Json(svc.search(&filter).await?))
}

pub async fn create<E: Searchable>(
    State(svc): Service<E>,
    ApiJson(input): ApiJson<E::Create>,
) -> Result<impl IntoResponse, JsonApiError> {
    let created = svc.create(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn fetch<E: Searchable>(State(svc): Service<E>, Path(id): Path<String>) -> Result<Json<E>, JsonApiError> {
    svc.get(&id).await?.map(Json).ok_or_else(|| JsonApiError::not_found(E::KIND, &id))
}

pub async fn update<E: Searchable>(
    State(svc): Service<E>,
    Path(id): Path<String>,
    ApiJson(changes): ApiJson<E::Update>,
) -> Result<Json<E>, JsonApiError> {
    svc.update(&id, changes).await?.map(Json).ok_or_else(|| JsonApiError::not_found(E::KIND, &id))
}

pub async fn remove<E: Searchable>(State(svc): Service<E>, Path(id): Path<String>) -> Result<StatusCode, JsonApiError> {
    if svc.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(JsonApiError::not_found(E::KIND, &id))
    }
}
