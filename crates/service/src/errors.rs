use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("model error: {0}")]
    Model(#[from] models::errors::ModelError),
}

impl ServiceError {
    pub fn already_exists(kind: &str, id: &str) -> Self { Self::AlreadyExists(format!("{kind} {id}")) }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self { Self::Codec(e.to_string()) }
}
