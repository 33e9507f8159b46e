use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use cueline_core::S3Settings;
use cueline_core::runtime::RuntimeIntervals;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8624";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_CATALOG_KEY: &str = "cueline.toml";
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub store: StoreConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Directory served for anything that is not an API route.
    pub static_dir: Option<PathBuf>,
}

#[derive(Clone)]
pub struct StorageConfig {
    /// `host[:port]` or full URL of an S3-compatible endpoint. `None` targets
    /// AWS.
    pub host: Option<String>,
    pub bucket: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Talk plain HTTP to `host` when it carries no scheme.
    pub insecure: bool,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("host", &self.host)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("insecure", &self.insecure)
            .finish_non_exhaustive()
    }
}

impl StorageConfig {
    pub fn endpoint(&self) -> Option<String> {
        self.host.as_ref().map(|host| {
            if host.contains("://") {
                host.clone()
            } else if self.insecure {
                format!("http://{host}")
            } else {
                format!("https://{host}")
            }
        })
    }

    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            // Custom hosts are addressed path-style.
            force_path_style: self.host.is_some(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Object key of the catalog inside the bucket.
    pub key: String,
    /// Local catalog file; takes precedence over `key` when set.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub snapshot_key: String,
    pub save_interval: Duration,
    pub refresh_interval: Duration,
}

impl StoreConfig {
    pub fn intervals(&self) -> RuntimeIntervals {
        RuntimeIntervals {
            refresh: self.refresh_interval,
            save: self.save_interval,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
