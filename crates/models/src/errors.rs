use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("validation error: {0}")]
    Validation(String),
}

impl ModelError {
    pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }
}
