use anyhow::{Result, Context};
use async_trait::async_trait;
use reqwest::Client;
use log::{info, error, debug, warn};
use serde_json::Value;
use std::time::{Duration, Instant};
use chrono::Utc;

use super::models::FeedPayload;
use super::SnapshotSource;
use crate::error::{Feed, FetchError};

/// HTTP client for the Flux application, node and location feeds
pub struct FluxApiClient {
    client: Client,
    apps_url: String,
    nodes_url: String,
    locations_url: Option<String>,
}

impl FluxApiClient {
    /// Create a new API client
    pub fn new(
        apps_url: String,
        nodes_url: String,
        locations_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("flux-stats/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            apps_url,
            nodes_url,
            locations_url,
        })
    }

    /// Fetch one feed and return its records with any envelope removed
    async fn get_feed(&self, feed: Feed, url: &str) -> Result<Vec<Value>, FetchError> {
        debug!("Fetching {} feed from {}", feed, url);

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        let start_time = Instant::now();

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                error!("[{}] GET - {}ms - {} - REQUEST FAILED ({})",
                       timestamp, start_time.elapsed().as_millis(), url, err);
                return Err(FetchError::new(feed, format!("request failed: {}", err)));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("[{}] GET - {}ms - {} - {} ERROR ({})",
                   timestamp, start_time.elapsed().as_millis(), url, status.as_u16(), body);
            return Err(FetchError::new(feed, format!("HTTP status {}", status)));
        }

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(err) => {
                warn!("[{}] GET - {}ms - {} - {} ERROR (Failed to parse response: {})",
                      timestamp, start_time.elapsed().as_millis(), url, status.as_u16(), err);
                return Err(FetchError::new(feed, format!("invalid JSON: {}", err)));
            }
        };

        let duration = start_time.elapsed().as_millis();
        match FeedPayload::from_json(payload) {
            FeedPayload::Records(records) => {
                info!("[{}] GET - {}ms - {} - {} OK ({} records)",
                      timestamp, duration, url, status.as_u16(), records.len());
                Ok(records)
            }
            FeedPayload::ApiError(message) => {
                error!("[{}] GET - {}ms - {} - API ERROR ({})", timestamp, duration, url, message);
                Err(FetchError::new(feed, format!("API error: {}", message)))
            }
            FeedPayload::Unexpected(shape) => {
                error!("[{}] GET - {}ms - {} - UNEXPECTED PAYLOAD ({})", timestamp, duration, url, shape);
                Err(FetchError::new(feed, format!("unexpected payload shape: {}", shape)))
            }
        }
    }
}

#[async_trait]
impl SnapshotSource for FluxApiClient {
    async fn fetch_apps(&self) -> Result<Vec<Value>, FetchError> {
        self.get_feed(Feed::Apps, &self.apps_url).await
    }

    async fn fetch_nodes(&self) -> Result<Vec<Value>, FetchError> {
        self.get_feed(Feed::Nodes, &self.nodes_url).await
    }

    async fn fetch_locations(&self) -> Option<Result<Vec<Value>, FetchError>> {
        let url = self.locations_url.as_deref()?;
        Some(self.get_feed(Feed::Locations, url).await)
    }
}
