use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub storage: FileStorageConfig,
    #[serde(default)]
    pub catalog: FileCatalogConfig,
    #[serde(default)]
    pub store: FileStoreConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCatalogConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStoreConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_key: Option<String>,
    /// humantime string, e.g. `"1m"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub static_dir: Option<PathBuf>,
    pub s3_host: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_insecure: Option<bool>,
    pub catalog_key: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub snapshot_key: Option<String>,
    pub save_interval: Option<String>,
    pub refresh_interval: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            config_path: var("CUELINE_CONFIG").map(PathBuf::from),
            bind_addr: var("BIND_ADDR"),
            static_dir: var("STATIC_DIR").map(PathBuf::from),
            s3_host: var("S3_HOST"),
            s3_bucket: var("S3_BUCKET"),
            s3_region: var("S3_REGION"),
            s3_access_key_id: var("S3_ACCESS_KEY_ID"),
            s3_secret_access_key: var("S3_SECRET_ACCESS_KEY"),
            s3_insecure: var("S3_INSECURE").and_then(|value| parse_bool(&value)),
            catalog_key: var("CATALOG_KEY"),
            catalog_path: var("CATALOG_PATH").map(PathBuf::from),
            snapshot_key: var("SNAPSHOT_KEY"),
            save_interval: var("SAVE_INTERVAL"),
            refresh_interval: var("REFRESH_INTERVAL"),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn reads_known_variables_and_ignores_blank_ones() {
        let vars: HashMap<&str, &str> = [
            ("S3_HOST", "minio.local:9000"),
            ("S3_BUCKET", "videos"),
            ("S3_INSECURE", "TRUE"),
            ("BIND_ADDR", "  "),
            ("SAVE_INTERVAL", "30s"),
        ]
        .into_iter()
        .collect();

        let env = EnvConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(env.s3_host.as_deref(), Some("minio.local:9000"));
        assert_eq!(env.s3_bucket.as_deref(), Some("videos"));
        assert_eq!(env.s3_insecure, Some(true));
        assert_eq!(env.bind_addr, None);
        assert_eq!(env.save_interval.as_deref(), Some("30s"));
        assert_eq!(env.refresh_interval, None);
    }

    #[test]
    fn file_config_tolerates_missing_sections() {
        let parsed: FileConfig = toml::from_str("[storage]\nbucket = \"media\"\n").unwrap();
        assert_eq!(parsed.storage.bucket.as_deref(), Some("media"));
        assert!(parsed.server.bind.is_none());
        assert!(parsed.store.save_interval.is_none());
    }
}
