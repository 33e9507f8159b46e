//! Declarative description of users and their playlists.
//!
//! The catalog is authored as TOML and is the source of truth the reconciler
//! merges into the live store at startup:
//!
//! ```toml
//! [users.alice.playlists.news]
//! prefixes = ["news/daily/"]
//! sorttype = "date"
//! maxage = "72h"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::CatalogError;
use crate::sort_key::SortType;
use crate::storage::ObjectStore;

/// Max age substituted when none (or a uselessly small one) is configured.
pub const MAX_AGE_SENTINEL: Duration =
    Duration::from_secs(50 * 365 * 24 * 60 * 60);

/// Configured max ages at or below this are treated as unset.
pub const MAX_AGE_FLOOR: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub users: BTreeMap<String, UserSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSpec {
    pub playlists: BTreeMap<String, PlaylistSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistSpec {
    pub prefixes: Vec<String>,
    pub sort_type: SortType,
    pub max_age: Option<Duration>,
}

impl PlaylistSpec {
    /// Max age after normalization: anything not strictly above one hour
    /// becomes [`MAX_AGE_SENTINEL`].
    pub fn effective_max_age(&self) -> Duration {
        normalize_max_age(self.max_age)
    }
}

pub fn normalize_max_age(configured: Option<Duration>) -> Duration {
    match configured {
        Some(max_age) if max_age > MAX_AGE_FLOOR => max_age,
        _ => MAX_AGE_SENTINEL,
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawCatalog {
    #[serde(default, alias = "Users")]
    users: BTreeMap<String, RawUser>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUser {
    #[serde(default, alias = "Playlists")]
    playlists: BTreeMap<String, RawPlaylist>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPlaylist {
    #[serde(default, alias = "Prefixes")]
    prefixes: Vec<String>,
    #[serde(default, alias = "sort_type", alias = "Sorttype")]
    sorttype: SortType,
    #[serde(default, alias = "max_age", alias = "MaxAge")]
    maxage: Option<String>,
}

impl Catalog {
    pub fn from_toml_str(contents: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = toml::from_str(contents)?;

        let mut users = BTreeMap::new();
        for (username, raw_user) in raw.users {
            let mut playlists = BTreeMap::new();
            for (name, raw_playlist) in raw_user.playlists {
                let max_age = match raw_playlist.maxage.as_deref().map(str::trim) {
                    None | Some("") => None,
                    Some(value) => Some(humantime::parse_duration(value).map_err(
                        |source| CatalogError::MaxAge {
                            user: username.clone(),
                            playlist: name.clone(),
                            value: value.to_string(),
                            source,
                        },
                    )?),
                };
                playlists.insert(
                    name,
                    PlaylistSpec {
                        prefixes: raw_playlist.prefixes,
                        sort_type: raw_playlist.sorttype,
                        max_age,
                    },
                );
            }
            users.insert(username, UserSpec { playlists });
        }

        Ok(Self { users })
    }

    pub fn load_path(path: &Path) -> Result<Self, CatalogError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), size = contents.len(), "read catalog file");
        Self::from_toml_str(&contents)
    }

    /// Fetch the catalog object from the bucket it describes.
    pub async fn load_remote(
        store: &dyn ObjectStore,
        key: &str,
    ) -> Result<Self, CatalogError> {
        let bytes = store
            .get_object(key)
            .await?
            .ok_or_else(|| CatalogError::Missing {
                key: key.to_string(),
            })?;
        debug!(key, size = bytes.len(), "read catalog object");
        Self::from_toml_str(&String::from_utf8(bytes)?)
    }

    pub fn playlist_count(&self) -> usize {
        self.users.values().map(|user| user.playlists.len()).sum()
    }
}
