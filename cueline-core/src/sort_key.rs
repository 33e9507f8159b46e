use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::episode::{EpisodeNotFound, parse_episode};

/// Strategy used to derive a video's identifier within a playlist.
///
/// The identifier doubles as the ordering key: playlists present their videos
/// in ascending string order of these ids.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SortType {
    /// Last-modified timestamp of the backing object, then its key.
    Date,
    /// Canonical `sNNeNN` episode id, then the object key.
    Episode,
    /// The basename alone. Objects sharing a basename collapse into one video.
    #[default]
    Filename,
}

impl SortType {
    pub fn as_str(self) -> &'static str {
        match self {
            SortType::Date => "date",
            SortType::Episode => "episode",
            SortType::Filename => "filename",
        }
    }
}

impl fmt::Display for SortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "date" => Ok(SortType::Date),
            "episode" => Ok(SortType::Episode),
            "filename" => Ok(SortType::Filename),
            other => Err(format!("unknown sort type: {other}")),
        }
    }
}

/// Last path segment of an object key.
pub fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Derive the video id for an object discovered under a playlist prefix.
///
/// Fails only for [`SortType::Episode`] when the filename carries no episode
/// number; the caller skips such objects for the current pass.
pub fn video_id(
    sort_type: SortType,
    key: &str,
    last_modified: DateTime<Utc>,
) -> Result<String, EpisodeNotFound> {
    match sort_type {
        SortType::Date => Ok(format!(
            "{}_{}",
            last_modified.to_rfc3339_opts(SecondsFormat::Secs, true),
            key
        )),
        SortType::Episode => {
            let episode = parse_episode(basename(key))?;
            Ok(format!("{episode}_{key}"))
        }
        SortType::Filename => Ok(basename(key).to_string()),
    }
}
