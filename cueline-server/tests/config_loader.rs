use std::time::Duration;

use cueline_server::infra::config::sources::EnvConfig;
use cueline_server::infra::config::{ConfigLoadError, ConfigLoader};

const FILE: &str = r#"
[server]
bind = "127.0.0.1:9000"
static_dir = "public"

[storage]
host = "minio.internal:9000"
bucket = "from-file"
access_key_id = "file-key"
secret_access_key = "file-secret"

[catalog]
path = "playlists.toml"

[store]
save_interval = "30s"
refresh_interval = "5m"
"#;

#[test]
fn file_values_are_used_when_env_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cueline.toml");
    std::fs::write(&path, FILE).unwrap();

    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default(), false)
        .unwrap();
    let config = load.config;

    assert_eq!(config.server.bind.to_string(), "127.0.0.1:9000");
    assert_eq!(config.storage.bucket, "from-file");
    assert_eq!(
        config.storage.endpoint().as_deref(),
        Some("https://minio.internal:9000")
    );
    assert_eq!(config.catalog.key, "cueline.toml");
    assert_eq!(
        config.catalog.path.as_deref(),
        Some(std::path::Path::new("playlists.toml"))
    );
    assert_eq!(config.store.save_interval, Duration::from_secs(30));
    assert_eq!(config.store.refresh_interval, Duration::from_secs(300));
    assert_eq!(config.store.snapshot_key, ".cueline-db.json");
    assert_eq!(config.metadata.config_path.as_deref(), Some(path.as_path()));
    assert!(load.warnings.is_empty());
}

#[test]
fn environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cueline.toml");
    std::fs::write(&path, FILE).unwrap();

    let env = EnvConfig {
        bind_addr: Some(":8700".to_string()),
        s3_bucket: Some("from-env".to_string()),
        s3_insecure: Some(true),
        save_interval: Some("2m".to_string()),
        snapshot_key: Some("state/db.json".to_string()),
        ..EnvConfig::default()
    };
    let config = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env, false)
        .unwrap()
        .config;

    assert_eq!(config.server.bind.to_string(), "0.0.0.0:8700");
    assert_eq!(config.storage.bucket, "from-env");
    assert_eq!(
        config.storage.endpoint().as_deref(),
        Some("http://minio.internal:9000")
    );
    assert_eq!(config.store.save_interval, Duration::from_secs(120));
    assert_eq!(config.store.refresh_interval, Duration::from_secs(300));
    assert_eq!(config.store.snapshot_key, "state/db.json");
}

#[test]
fn explicit_config_path_must_exist() {
    let env = EnvConfig {
        s3_bucket: Some("videos".to_string()),
        ..EnvConfig::default()
    };
    let dir = tempfile::tempdir().unwrap();
    let load = ConfigLoader::new()
        .with_config_path(dir.path().join("absent.toml"))
        .load_with_env(env, false);

    assert!(matches!(load, Err(ConfigLoadError::MissingConfig { .. })));
}

#[test]
fn missing_bucket_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cueline.toml");
    std::fs::write(&path, "[server]\nbind = \"127.0.0.1:1\"\n").unwrap();

    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default(), false)
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::MissingBucket));
}

#[test]
fn invalid_interval_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cueline.toml");
    std::fs::write(
        &path,
        "[storage]\nbucket = \"b\"\n[store]\nrefresh_interval = \"often\"\n",
    )
    .unwrap();

    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default(), false)
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::InvalidDuration {
            field: "refresh_interval",
            ..
        }
    ));
}

#[test]
fn env_file_values_are_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("cueline.toml");
    std::fs::write(&config_path, "[storage]\nbucket = \"videos\"\n").unwrap();
    let env_path = dir.path().join("cueline.env");
    std::fs::write(&env_path, "SNAPSHOT_KEY=state/from-dotenv.json\n").unwrap();

    let load = ConfigLoader::new()
        .with_config_path(&config_path)
        .with_env_file(&env_path)
        .load()
        .unwrap();

    assert!(load.config.metadata.env_file_loaded);
    assert_eq!(load.config.store.snapshot_key, "state/from-dotenv.json");
}

#[test]
fn absent_env_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("cueline.toml");
    std::fs::write(&config_path, "[storage]\nbucket = \"videos\"\n").unwrap();

    let load = ConfigLoader::new()
        .with_config_path(&config_path)
        .with_env_file(dir.path().join("absent.env"))
        .load()
        .unwrap();

    assert!(!load.config.metadata.env_file_loaded);
}
