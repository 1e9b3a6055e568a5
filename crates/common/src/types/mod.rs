use serde::{Deserialize, Serialize};

/// Body of the `GET /` banner.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    pub status: String,
}

impl ServiceInfo {
    pub fn new(app_name: &str, version: &str) -> Self {
        Self {
            message: format!("Welcome to {app_name}"),
            version: version.to_string(),
            status: "healthy".into(),
        }
    }
}
