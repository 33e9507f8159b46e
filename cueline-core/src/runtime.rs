//! Startup sequence and the two periodic background loops.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::error::SnapshotError;
use crate::store::{LoadOutcome, ProgressStore, ReconcileReport, RefreshReport};

/// Periods for the refresh and save loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeIntervals {
    pub refresh: Duration,
    pub save: Duration,
}

impl Default for RuntimeIntervals {
    fn default() -> Self {
        Self {
            refresh: Duration::from_secs(10 * 60),
            save: Duration::from_secs(60),
        }
    }
}

/// Result of [`bootstrap`].
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub load: LoadOutcome,
    pub reconcile: ReconcileReport,
    pub refresh: RefreshReport,
}

/// Bring a fresh store up to date: restore the snapshot, merge the catalog,
/// then run one synchronous refresh.
///
/// A corrupt or unreadable snapshot aborts startup.
pub async fn bootstrap(
    store: &ProgressStore,
    catalog: &Catalog,
) -> Result<BootstrapReport, SnapshotError> {
    let load = store.load().await?;
    let reconcile = store.reconcile(catalog).await;
    let refresh = store.refresh().await;
    Ok(BootstrapReport {
        load,
        reconcile,
        refresh,
    })
}

/// Handles to the running refresh and save loops.
#[derive(Debug)]
pub struct BackgroundTasks {
    store: ProgressStore,
    token: CancellationToken,
    refresh: JoinHandle<()>,
    save: JoinHandle<()>,
}

impl BackgroundTasks {
    /// Start both loops. The first tick of each fires one full period after
    /// spawning; callers run the initial refresh themselves via [`bootstrap`].
    pub fn spawn(
        store: ProgressStore,
        intervals: RuntimeIntervals,
        token: CancellationToken,
    ) -> Self {
        info!(
            refresh = %humantime::format_duration(intervals.refresh),
            save = %humantime::format_duration(intervals.save),
            "starting background tasks"
        );

        let refresh = tokio::spawn(refresh_loop(
            store.clone(),
            intervals.refresh,
            token.clone(),
        ));
        let save = tokio::spawn(save_loop(store.clone(), intervals.save, token.clone()));

        Self {
            store,
            token,
            refresh,
            save,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Stop both loops, wait for them, then flush any unsaved progress.
    pub async fn shutdown(self) -> Result<(), SnapshotError> {
        self.token.cancel();
        for (name, handle) in [("refresh", self.refresh), ("save", self.save)] {
            if let Err(err) = handle.await {
                warn!(task = name, error = %err, "background task ended abnormally");
            }
        }

        self.store.save().await?;
        info!("background tasks stopped");
        Ok(())
    }
}

async fn refresh_loop(store: ProgressStore, period: Duration, token: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("refresh loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                store.refresh().await;
            }
        }
    }
}

async fn save_loop(store: ProgressStore, period: Duration, token: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("save loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                if let Err(err) = store.save().await {
                    error!(error = %err, "periodic save failed; will retry");
                }
            }
        }
    }
}
