pub mod loader;
pub mod models;
pub mod sources;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    CatalogConfig, Config, ConfigMetadata, ConfigWarning, ConfigWarnings, ServerConfig,
    StorageConfig, StoreConfig,
};
