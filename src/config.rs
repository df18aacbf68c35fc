use crate::error::{KubeGraphError, KubeGraphResult};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub cluster: ClusterConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Explicit kubeconfig; otherwise inferred from the environment.
    pub kubeconfig: Option<PathBuf>,
    /// Restrict namespaced listings to one namespace.
    pub namespace: Option<String>,
    /// Always serve the built-in demo inventory.
    pub demo: bool,
    /// Serve the demo inventory when no cluster credentials load.
    pub demo_fallback: bool,
    /// Only match selectors against pods in the owner's namespace.
    pub scoped_selectors: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub http_uri: String,
    pub bolt_uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: usize,
    pub acquire_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Maximum rows per write statement.
    pub batch_size: usize,
}

impl StoreConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            http_uri: "http://localhost:7474".into(),
            bolt_uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: "password".into(),
            database: "neo4j".into(),
            max_connections: 50,
            acquire_timeout_secs: 60,
            request_timeout_secs: 30,
            batch_size: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    let store = StoreConfig::default();
    builder
        .set_default("cluster.demo", false)?
        .set_default("cluster.demo_fallback", true)?
        .set_default("cluster.scoped_selectors", false)?
        .set_default("store.http_uri", store.http_uri)?
        .set_default("store.bolt_uri", store.bolt_uri)?
        .set_default("store.user", store.user)?
        .set_default("store.password", store.password)?
        .set_default("store.database", store.database)?
        .set_default("store.max_connections", store.max_connections as i64)?
        .set_default("store.acquire_timeout_secs", store.acquire_timeout_secs as i64)?
        .set_default("store.request_timeout_secs", store.request_timeout_secs as i64)?
        .set_default("store.batch_size", store.batch_size as i64)?
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 3001_i64)
}

pub fn load_config(path: Option<&Path>) -> KubeGraphResult<AppConfig> {
    let mut builder = with_defaults(Config::builder())
        .map_err(|err| KubeGraphError::ConfigError(err.to_string()))?
        .add_source(File::with_name("kubegraph").required(false));

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    let config = builder
        .add_source(Environment::with_prefix("KUBEGRAPH").separator("__"))
        .build()
        .map_err(|err| KubeGraphError::ConfigError(err.to_string()))?;

    let parsed: AppConfig = config
        .try_deserialize()
        .map_err(|err| KubeGraphError::ConfigError(err.to_string()))?;

    validate(&parsed)?;
    Ok(parsed)
}

fn validate(config: &AppConfig) -> KubeGraphResult<()> {
    let store = &config.store;
    if store.batch_size == 0 {
        return Err(KubeGraphError::ConfigError(
            "store.batch_size must be greater than zero".into(),
        ));
    }
    if store.max_connections == 0 {
        return Err(KubeGraphError::ConfigError(
            "store.max_connections must be greater than zero".into(),
        ));
    }
    if store.acquire_timeout_secs == 0 || store.request_timeout_secs == 0 {
        return Err(KubeGraphError::ConfigError(
            "store timeouts must be greater than zero".into(),
        ));
    }
    Ok(())
}
