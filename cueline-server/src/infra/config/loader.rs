use once_cell::sync::Lazy;
use std::{
    fs,
    net::SocketAddr,
    path::PathBuf,
    time::Duration,
};
use thiserror::Error;

use super::{
    models::{
        CatalogConfig, Config, ConfigMetadata, ConfigWarnings, DEFAULT_BIND_ADDR,
        DEFAULT_CATALOG_KEY, DEFAULT_REFRESH_INTERVAL, DEFAULT_REGION,
        DEFAULT_SAVE_INTERVAL, ServerConfig, StorageConfig, StoreConfig,
    },
    sources::{EnvConfig, FileConfig},
};
use cueline_core::DEFAULT_SNAPSHOT_KEY;

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("cueline.toml"),
        PathBuf::from("config/cueline.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env`, read the process environment, then resolve.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        self.load_with_env(EnvConfig::gather(), env_file_loaded)
    }

    /// Resolve against an explicit environment snapshot.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
        env_file_loaded: bool,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) =
            compose_config(file_config, env, config_path, env_file_loaded)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env_config.config_path) {
            (Some(path), _) | (None, Some(path)) => (Some(path.clone()), true),
            (None, None) => (
                DEFAULT_CONFIG_LOCATIONS
                    .iter()
                    .find(|candidate| candidate.exists())
                    .cloned(),
                false,
            ),
        };

        let Some(path) = path else {
            return Ok((None, None));
        };
        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents = fs::read_to_string(&path).map_err(|err| {
            ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            }
        })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        Ok((Some(file_config), Some(path)))
    }
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
    env_file_loaded: bool,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if config_path.is_none() {
        warnings.push_with_hint(
            "No cueline.toml detected; falling back to environment variables",
            "Set CUELINE_CONFIG or pass --config to use a configuration file",
        );
    }

    let FileConfig {
        server: file_server,
        storage: file_storage,
        catalog: file_catalog,
        store: file_store,
    } = file_config.unwrap_or_default();

    let bind_raw = env
        .bind_addr
        .or(file_server.bind)
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let server = ServerConfig {
        bind: parse_bind_addr(&bind_raw)?,
        static_dir: env.static_dir.or(file_server.static_dir),
    };

    let bucket = env
        .s3_bucket
        .or(file_storage.bucket)
        .filter(|bucket| !bucket.trim().is_empty())
        .ok_or(ConfigLoadError::MissingBucket)?;
    let storage = StorageConfig {
        host: env.s3_host.or(file_storage.host),
        bucket,
        region: env
            .s3_region
            .or(file_storage.region)
            .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        access_key_id: env.s3_access_key_id.or(file_storage.access_key_id),
        secret_access_key: env
            .s3_secret_access_key
            .or(file_storage.secret_access_key),
        insecure: env.s3_insecure.or(file_storage.insecure).unwrap_or(false),
    };
    if storage.access_key_id.is_none() && storage.secret_access_key.is_none() {
        warnings.push_with_hint(
            "No static S3 credentials configured; using the default AWS credential chain",
            "Set S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY for self-hosted endpoints",
        );
    }
    if storage.insecure && storage.host.is_none() {
        warnings.push("S3_INSECURE has no effect without S3_HOST");
    }

    let catalog = CatalogConfig {
        key: env
            .catalog_key
            .or(file_catalog.key)
            .unwrap_or_else(|| DEFAULT_CATALOG_KEY.to_string()),
        path: env.catalog_path.or(file_catalog.path),
    };

    let store = StoreConfig {
        snapshot_key: env
            .snapshot_key
            .or(file_store.snapshot_key)
            .unwrap_or_else(|| DEFAULT_SNAPSHOT_KEY.to_string()),
        save_interval: resolve_interval(
            "save_interval",
            env.save_interval.or(file_store.save_interval),
            DEFAULT_SAVE_INTERVAL,
        )?,
        refresh_interval: resolve_interval(
            "refresh_interval",
            env.refresh_interval.or(file_store.refresh_interval),
            DEFAULT_REFRESH_INTERVAL,
        )?,
    };

    let config = Config {
        server,
        storage,
        catalog,
        store,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded,
        },
    };

    Ok((config, warnings))
}

/// Accepts `host:port` or the bare `:port` form.
fn parse_bind_addr(raw: &str) -> Result<SocketAddr, ConfigLoadError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.starts_with(':') {
        format!("0.0.0.0{trimmed}")
    } else {
        trimmed.to_string()
    };
    candidate
        .parse()
        .map_err(|source| ConfigLoadError::InvalidBindAddr {
            value: raw.to_string(),
            source,
        })
}

fn resolve_interval(
    field: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let interval = humantime::parse_duration(raw.trim()).map_err(|source| {
        ConfigLoadError::InvalidDuration {
            field,
            value: raw.clone(),
            source,
        }
    })?;
    if interval.is_zero() {
        return Err(ConfigLoadError::ZeroInterval { field });
    }
    Ok(interval)
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("no bucket configured; set S3_BUCKET or storage.bucket")]
    MissingBucket,
    #[error("invalid bind address {value:?}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("invalid duration {value:?} for {field}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
