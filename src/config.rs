// src/config.rs
//
// Process configuration, read from the environment (and .env)

use log::warn;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::RefreshConfig;
use crate::stats::{StatsSettings, TierTable};

pub const DEFAULT_APPS_URL: &str = "https://api.runonflux.io/apps/globalappsspecifications";
pub const DEFAULT_NODES_URL: &str = "https://api.runonflux.io/daemon/viewdeterministiczelnodelist";
pub const DEFAULT_TARGET_OWNER: &str = "196GJWyLxzAw3MirTT7Bqs2iGpUQio29GH";

#[derive(Debug, Clone)]
pub struct Config {
    /// Application specifications feed
    pub apps_url: String,

    /// Node inventory feed
    pub nodes_url: String,

    /// Optional running-instance placement feed
    pub locations_url: Option<String>,

    /// Timeout for each upstream request
    pub request_timeout: Duration,

    /// Directory for the cached report and the refresh marker
    pub cache_dir: PathBuf,

    /// Minimum time between refresh attempts
    pub cooldown: Duration,

    /// How often the daemon refreshes on its own
    pub refresh_interval: Duration,

    pub stats: StatsSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            apps_url: DEFAULT_APPS_URL.to_string(),
            nodes_url: DEFAULT_NODES_URL.to_string(),
            locations_url: None,
            request_timeout: Duration::from_secs(20),
            cache_dir: PathBuf::from("cache"),
            cooldown: Duration::from_secs(300),
            refresh_interval: Duration::from_secs(10 * 60),
            stats: StatsSettings {
                target_owner: DEFAULT_TARGET_OWNER.to_string(),
                tiers: TierTable::flux(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            apps_url: text("FLUX_APPS_URL").unwrap_or(defaults.apps_url),
            nodes_url: text("FLUX_NODES_URL").unwrap_or(defaults.nodes_url),
            locations_url: text("FLUX_LOCATIONS_URL"),
            request_timeout: Duration::from_secs(
                parsed(&lookup, "API_TIMEOUT_SECS").unwrap_or(defaults.request_timeout.as_secs()),
            ),
            cache_dir: text("CACHE_DIR").map(PathBuf::from).unwrap_or(defaults.cache_dir),
            cooldown: Duration::from_secs(
                parsed(&lookup, "REFRESH_COOLDOWN_SECS").unwrap_or(defaults.cooldown.as_secs()),
            ),
            refresh_interval: Duration::from_secs(
                parsed::<u64, _>(&lookup, "REFRESH_INTERVAL_MINS")
                    .map(|mins| mins * 60)
                    .unwrap_or(defaults.refresh_interval.as_secs()),
            ),
            stats: StatsSettings {
                target_owner: text("TARGET_OWNER").unwrap_or(defaults.stats.target_owner),
                tiers: defaults.stats.tiers,
            },
        }
    }

    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            cache_dir: self.cache_dir.clone(),
            cooldown: self.cooldown,
        }
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}
