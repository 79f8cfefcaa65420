pub mod client;
pub mod models;

pub use client::FluxApiClient;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;

/// Upstream feeds a refresh reads from.
///
/// Implementations return already-deserialized records with any response
/// envelope removed. They do not retry; a failure ends the refresh cycle.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_apps(&self) -> Result<Vec<Value>, FetchError>;

    async fn fetch_nodes(&self) -> Result<Vec<Value>, FetchError>;

    /// Optional placement feed, `None` when not configured
    async fn fetch_locations(&self) -> Option<Result<Vec<Value>, FetchError>> {
        None
    }
}
