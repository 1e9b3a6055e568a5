use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8000, worker_threads: Some(4) }
    }
}

/// Which client the server builds for the document store.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store, optionally snapshotted to `data_file`.
    #[default]
    Local,
    /// Cosmos DB REST API at `endpoint`.
    Cosmos,
}

impl StoreBackend {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "memory" => Ok(StoreBackend::Local),
            "cosmos" => Ok(StoreBackend::Cosmos),
            other => Err(anyhow!("unknown store backend {other:?}; expected local or cosmos")),
        }
    }
}

/// Document store connection settings shared by every entity collection.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub key: String,
    /// JSON snapshot file for the local store; in-memory only when unset.
    #[serde(default)]
    pub data_file: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_throughput")]
    pub throughput: u32,
    #[serde(default)]
    pub seed_when_empty: bool,
    #[serde(default = "CollectionConfig::pets")]
    pub pets: CollectionConfig,
    #[serde(default = "CollectionConfig::activities")]
    pub activities: CollectionConfig,
    #[serde(default = "CollectionConfig::accessories")]
    pub accessories: CollectionConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            endpoint: default_endpoint(),
            key: String::new(),
            data_file: None,
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            throughput: default_throughput(),
            seed_when_empty: false,
            pets: CollectionConfig::pets(),
            activities: CollectionConfig::activities(),
            accessories: CollectionConfig::accessories(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CollectionConfig {
    pub database: String,
    pub container: String,
}

impl CollectionConfig {
    pub fn new(database: &str, container: &str) -> Self {
        Self { database: database.into(), container: container.into() }
    }

    pub fn pets() -> Self { Self::new("petservice", "pets") }
    pub fn activities() -> Self { Self::new("activityservice", "activities") }
    pub fn accessories() -> Self { Self::new("accessoryservice", "accessories") }

    fn validate(&self, label: &str) -> Result<()> {
        if self.database.trim().is_empty() || self.container.trim().is_empty() {
            return Err(anyhow!("store.{label}: database and container names must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `compact` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { format: default_log_format(), filter: default_log_filter() }
    }
}

fn default_endpoint() -> String { "http://localhost:8081".into() }
fn default_connect_timeout() -> u64 { 30 }
fn default_request_timeout() -> u64 { 30 }
fn default_throughput() -> u32 { 400 }
fn default_log_format() -> String { "compact".into() }
fn default_log_filter() -> String { "info,tower_http=info,axum=info".into() }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Like [`AppConfig::load_and_validate`], but a missing config file yields defaults.
    /// A file that exists and fails to parse is still an error.
    pub fn load_or_default() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let mut cfg = if std::path::Path::new(&path).exists() {
            load_from_file(&path)?
        } else {
            AppConfig::default()
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize_from_env();
        self.server.normalize()?;
        self.store.normalize_from_env()?;
        self.store.validate()?;
        self.logging.normalize();
        Ok(())
    }
}

impl ServerConfig {
    fn normalize_from_env(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(4); }
        } else {
            self.worker_threads = Some(4);
        }
        Ok(())
    }
}

impl StoreConfig {
    pub fn normalize_from_env(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("STORE_BACKEND") {
            if !backend.trim().is_empty() {
                self.backend = StoreBackend::parse(&backend)?;
            }
        }
        if let Ok(endpoint) = std::env::var("COSMOS_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint;
            }
        }
        if let Ok(key) = std::env::var("COSMOS_KEY") {
            self.key = key;
        }
        if let Ok(path) = std::env::var("COSMOS_DATA_FILE") {
            self.data_file = if path.trim().is_empty() { None } else { Some(path) };
        }
        if let Ok(flag) = std::env::var("COSMOS_SEED_WHEN_EMPTY") {
            self.seed_when_empty = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let lower = self.endpoint.trim().to_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(anyhow!("store.endpoint must start with http:// or https://"));
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(anyhow!("store timeouts must be positive seconds"));
        }
        if self.throughput < 400 {
            return Err(anyhow!("store.throughput must be >= 400"));
        }
        if self.backend == StoreBackend::Cosmos && self.data_file.is_some() {
            return Err(anyhow!("store.data_file only applies to the local backend"));
        }
        self.pets.validate("pets")?;
        self.activities.validate("activities")?;
        self.accessories.validate("accessories")?;
        Ok(())
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        let format = self.format.trim().to_ascii_lowercase();
        self.format = if format == "json" { format } else { "compact".into() };
        if self.filter.trim().is_empty() {
            self.filter = default_log_filter();
        }
    }
}
