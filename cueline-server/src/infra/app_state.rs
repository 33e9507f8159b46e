use std::{fmt, sync::Arc};

use cueline_core::ProgressStore;

use crate::infra::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub store: ProgressStore,
    pub config: Arc<Config>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(store: ProgressStore, config: Arc<Config>) -> Self {
        Self { store, config }
    }
}
