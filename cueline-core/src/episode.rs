//! Season/episode extraction from video filenames.
//!
//! Two patterns are tried in order. The primary pattern understands the usual
//! `S01E02` / `1x02` forms. The compact fallback accepts `102` style numbering
//! (one season digit followed by a two digit episode) but refuses anything that
//! looks like a resolution tag such as `1080p` or `720p`.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static EPISODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r".*?[sS]?([0-9]{1,2})[xeXE]([0-9]{1,2}).*")
        .expect("episode regex should compile")
});

static COMPACT_EPISODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r".*[^2-9]([0-9])([0-3][0-9])[^0-9p].*")
        .expect("compact episode regex should compile")
});

/// Canonical, sortable episode identifier in the form `sNNeNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpisodeId {
    pub season: u32,
    pub episode: u32,
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{:02}e{:02}", self.season, self.episode)
    }
}

/// Raised when no pattern yields a season/episode pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not extract episode id from {0:?}")]
pub struct EpisodeNotFound(pub String);

/// Extract the canonical episode id from a filename.
pub fn parse_episode(filename: &str) -> Result<EpisodeId, EpisodeNotFound> {
    for (name, pattern) in [
        ("episode", &*EPISODE_PATTERN),
        ("compact", &*COMPACT_EPISODE_PATTERN),
    ] {
        let Some(captures) = pattern.captures(filename) else {
            continue;
        };
        let season = captures[1].parse::<u32>();
        let episode = captures[2].parse::<u32>();
        return match (season, episode) {
            (Ok(season), Ok(episode)) => {
                let id = EpisodeId { season, episode };
                debug!(pattern = name, filename, %id, "parsed episode");
                Ok(id)
            }
            _ => Err(EpisodeNotFound(filename.to_string())),
        };
    }

    Err(EpisodeNotFound(filename.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(filename: &str) -> Option<String> {
        parse_episode(filename).ok().map(|id| id.to_string())
    }

    #[test]
    fn parses_standard_season_episode() {
        assert_eq!(canonical("Show.S01E02.mp4").as_deref(), Some("s01e02"));
        assert_eq!(canonical("show.s12e07.720p.mp4").as_deref(), Some("s12e07"));
    }

    #[test]
    fn parses_x_separator() {
        assert_eq!(canonical("Show 1x02 - Pilot.mp4").as_deref(), Some("s01e02"));
        assert_eq!(canonical("Show.3X11.mp4").as_deref(), Some("s03e11"));
    }

    #[test]
    fn falls_back_to_compact_numbering() {
        assert_eq!(canonical("show.102.mp4").as_deref(), Some("s01e02"));
        assert_eq!(canonical("the.show.110.hdtv.mp4").as_deref(), Some("s01e10"));
    }

    #[test]
    fn rejects_resolution_tags() {
        assert_eq!(canonical("movie.1080p.mp4"), None);
        assert_eq!(canonical("movie.720p.mp4"), None);
    }

    #[test]
    fn reports_the_filename_on_failure() {
        let err = parse_episode("holiday.mp4").unwrap_err();
        assert_eq!(err, EpisodeNotFound("holiday.mp4".to_string()));
    }

    #[test]
    fn canonical_form_sorts_by_season_then_episode() {
        let mut ids = vec![
            canonical("s02e01.mp4").unwrap(),
            canonical("s01e10.mp4").unwrap(),
            canonical("s01e02.mp4").unwrap(),
        ];
        ids.sort();
        assert_eq!(ids, vec!["s01e02", "s01e10", "s02e01"]);
    }
}
