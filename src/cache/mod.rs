// src/cache/mod.rs
//
// Cache refresh pipeline for the statistics report.
// A refresh fetches both feeds, aggregates them and atomically replaces the
// cached report. Readers keep getting the last good report while a refresh
// is running or after one fails.

mod cooldown;
mod store;

pub use self::cooldown::CooldownGate;
pub use self::store::{CacheStore, STALE_TEMP_AGE};

use chrono::Utc;
use log::{info, warn, error};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

use crate::api::SnapshotSource;
use crate::error::{CacheError, RefreshError};
use crate::stats::normalize::{normalize_apps, normalize_locations, normalize_nodes};
use crate::stats::{Aggregator, CacheEntry, Snapshot};

/// Configuration for the cache refresher
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Directory holding the cache file and the refresh marker
    pub cache_dir: PathBuf,

    /// Minimum time between two refresh attempts
    pub cooldown: Duration,
}

/// Stage of the refresh cycle currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    Idle,
    Fetching,
    Aggregating,
    Writing,
}

/// Observable state of the refresher
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshStatus {
    pub phase: RefreshPhase,
    /// Finished cycles, successful or not
    pub completed_cycles: u64,
    /// `last_updated` of the most recent report written by this process
    pub last_success: Option<i64>,
    pub last_error: Option<String>,
}

impl Default for RefreshStatus {
    fn default() -> Self {
        Self {
            phase: RefreshPhase::Idle,
            completed_cycles: 0,
            last_success: None,
            last_error: None,
        }
    }
}

/// Answer to a manual refresh request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// A background refresh was started
    #[serde(rename = "ok")]
    Accepted,
    /// Rejected because the last attempt is too recent
    Cooldown {
        message: String,
        cooldown_remaining_seconds: u64,
    },
}

pub struct CacheRefresher {
    source: Arc<dyn SnapshotSource>,
    aggregator: Aggregator,
    store: CacheStore,
    gate: CooldownGate,
    trigger_lock: Mutex<()>,
    status: watch::Sender<RefreshStatus>,
}

impl CacheRefresher {
    pub fn new(source: Arc<dyn SnapshotSource>, aggregator: Aggregator, config: RefreshConfig) -> Self {
        let (status, _) = watch::channel(RefreshStatus::default());
        let store = CacheStore::new(config.cache_dir.clone());
        if let Err(e) = store.sweep_stale_temp_files(STALE_TEMP_AGE) {
            warn!("Failed to sweep stale temp files: {}", e);
        }
        Self {
            source,
            aggregator,
            store,
            gate: CooldownGate::new(config.cache_dir, config.cooldown),
            trigger_lock: Mutex::new(()),
            status,
        }
    }

    /// The last report written by any refresh
    pub fn get_cached_report(&self) -> Result<CacheEntry, CacheError> {
        self.store.load()
    }

    pub fn status(&self) -> RefreshStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshStatus> {
        self.status.subscribe()
    }

    /// Start a refresh in the background unless one was attempted within the cooldown.
    ///
    /// The attempt is recorded before the task is spawned, so a second trigger
    /// arriving while the first is still running is rejected.
    pub async fn trigger_refresh(self: &Arc<Self>) -> TriggerOutcome {
        let _guard = self.trigger_lock.lock().await;
        let now = Utc::now().timestamp_millis();

        if let Some(remaining) = self.gate.remaining(now) {
            let seconds = cooldown::remaining_seconds(remaining);
            info!("Refresh rejected, cooldown active for another {}s", seconds);
            return TriggerOutcome::Cooldown {
                message: format!("Refresh on cooldown, try again in {} seconds", seconds),
                cooldown_remaining_seconds: seconds,
            };
        }

        self.record_attempt(now);

        let refresher = Arc::clone(self);
        tokio::spawn(async move {
            // Outcome is logged and published through the status channel
            let _ = refresher.run_cycle().await;
        });

        TriggerOutcome::Accepted
    }

    /// Run one refresh in the foreground, ignoring the cooldown
    pub async fn refresh_now(&self) -> Result<CacheEntry, RefreshError> {
        self.record_attempt(Utc::now().timestamp_millis());
        self.run_cycle().await
    }

    fn record_attempt(&self, now: i64) {
        if let Err(e) = self.gate.record_attempt(now) {
            warn!("Failed to record refresh attempt: {}", e);
        }
    }

    async fn run_cycle(&self) -> Result<CacheEntry, RefreshError> {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        info!("[{}] Updating cache...", timestamp);

        let result = self.execute().await;

        match &result {
            Ok(entry) => {
                info!("[{}] Cache updated successfully ({} apps)", timestamp, entry.report.total_apps);
                info!("{}", entry.report);
            }
            Err(e) => error!("[{}] Failed to update cache: {}", timestamp, e),
        }

        self.status.send_modify(|status| {
            status.phase = RefreshPhase::Idle;
            status.completed_cycles += 1;
            match &result {
                Ok(entry) => {
                    status.last_success = Some(entry.last_updated);
                    status.last_error = None;
                }
                Err(e) => status.last_error = Some(e.to_string()),
            }
        });

        result
    }

    async fn execute(&self) -> Result<CacheEntry, RefreshError> {
        self.set_phase(RefreshPhase::Fetching);
        let apps = self.source.fetch_apps().await?;
        let nodes = self.source.fetch_nodes().await?;
        let locations = match self.source.fetch_locations().await {
            None => None,
            Some(Ok(records)) => Some(normalize_locations(&records)),
            Some(Err(e)) => {
                warn!("Continuing without placement data: {}", e);
                None
            }
        };

        self.set_phase(RefreshPhase::Aggregating);
        let snapshot = Snapshot {
            apps: normalize_apps(&apps),
            nodes: normalize_nodes(&nodes),
            locations,
        };
        let entry = CacheEntry {
            report: self.aggregator.aggregate(&snapshot),
            last_updated: Utc::now().timestamp_millis(),
        };

        self.set_phase(RefreshPhase::Writing);
        let path = self.store.save(&entry)?;
        info!("Report written to {}", path.display());

        Ok(entry)
    }

    fn set_phase(&self, phase: RefreshPhase) {
        self.status.send_modify(|status| status.phase = phase);
    }
}
