//! # Cueline Core
//!
//! Core library for cueline, a tracker for resumable per-user video playlists
//! whose media lives in an S3-compatible bucket.
//!
//! ## Overview
//!
//! - **Catalog**: declarative users and playlists (prefixes, sort type, max age)
//! - **Sort keys**: date, episode and filename based video identifiers
//! - **Progress store**: in-memory playback state behind one store-wide lock
//! - **Reconciler**: merges the catalog into the store without losing progress
//! - **Refresher**: prunes, discovers, reorders and auto-completes videos
//! - **Durability**: versioned JSON snapshot written back to the bucket
//!
//! ## Architecture
//!
//! - [`storage`]: object-store port with S3 and in-memory adapters
//! - [`catalog`]: catalog parsing and max-age normalization
//! - [`episode`] / [`sort_key`]: video identifier derivation
//! - [`store`]: the [`ProgressStore`] handle and everything operating on it
//! - [`runtime`]: startup sequence and the periodic refresh/save loops

pub mod catalog;
pub mod episode;
pub mod error;
pub mod runtime;
pub mod sort_key;
pub mod storage;
pub mod store;

pub use catalog::{Catalog, PlaylistSpec, UserSpec};
pub use error::{CatalogError, LookupMiss, SnapshotError, StorageError};
pub use runtime::{BackgroundTasks, BootstrapReport, RuntimeIntervals, bootstrap};
pub use sort_key::SortType;
pub use storage::{InMemoryObjectStore, ObjectInfo, ObjectStore, S3ObjectStore, S3Settings};
pub use store::{
    CurrentVideo, DEFAULT_SNAPSHOT_KEY, NextUp, Playlist, PlaylistSummary, ProgressStore,
    User, Video,
};
