// src/error.rs
//
// Error types shared by the feed client, the cache store and the refresher

use std::fmt;
use thiserror::Error;

/// Upstream feeds consumed by a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Apps,
    Nodes,
    Locations,
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feed::Apps => write!(f, "apps"),
            Feed::Nodes => write!(f, "nodes"),
            Feed::Locations => write!(f, "locations"),
        }
    }
}

/// A feed fetch failed (network, timeout, non-2xx or unusable payload)
#[derive(Debug, Clone, Error)]
#[error("{feed} feed fetch failed: {reason}")]
pub struct FetchError {
    pub feed: Feed,
    pub reason: String,
}

impl FetchError {
    pub fn new(feed: Feed, reason: impl Into<String>) -> Self {
        Self {
            feed,
            reason: reason.into(),
        }
    }
}

/// Why a refresh cycle did not produce a new cache entry
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to persist cache: {0}")]
    Persist(#[from] std::io::Error),
}

/// Errors on the cache read path
#[derive(Debug, Error)]
pub enum CacheError {
    /// No refresh has ever completed successfully
    #[error("Cache unavailable: no report has been written yet")]
    Unavailable,

    #[error("Cache file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("IO error reading cache: {0}")]
    Io(#[from] std::io::Error),
}
