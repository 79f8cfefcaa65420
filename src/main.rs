mod api;
mod cache;
mod config;
mod error;
mod stats;

use anyhow::{Result, Context};
use std::time::{Duration, Instant};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::env;
use log::{info, error, warn, debug};
use dotenv::dotenv;
use chrono::{TimeZone, Utc};

use api::FluxApiClient;
use cache::{CacheRefresher, TriggerOutcome};
use config::Config;
use error::CacheError;
use stats::Aggregator;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

fn print_separator() {
    println!("\n{}\n", "-".repeat(80));
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenv().ok();

    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env();
    let run_once = env::args().skip(1).any(|arg| arg == "--once");

    info!("Starting flux-stats (apps: {}, nodes: {}, cache: {})",
          config.apps_url, config.nodes_url, config.cache_dir.display());
    if let Some(url) = &config.locations_url {
        info!("Using location feed at {}", url);
    }
    info!("Refresh configuration: interval={}s, cooldown={}s, target_owner={}",
          config.refresh_interval.as_secs(),
          config.cooldown.as_secs(),
          config.stats.target_owner);

    let client = FluxApiClient::new(
        config.apps_url.clone(),
        config.nodes_url.clone(),
        config.locations_url.clone(),
        config.request_timeout,
    )
    .context("Failed to initialize API client")?;

    let refresher = Arc::new(CacheRefresher::new(
        Arc::new(client),
        Aggregator::new(config.stats.clone()),
        config.refresh_config(),
    ));

    if run_once {
        let entry = refresher.refresh_now().await
            .context("Refresh failed")?;
        print_separator();
        println!("{}", entry.report);
        print_separator();
        return Ok(());
    }

    match refresher.get_cached_report() {
        Ok(entry) => {
            let updated = Utc.timestamp_millis_opt(entry.last_updated).single();
            info!("Serving cached report from {}",
                  updated.map_or_else(|| entry.last_updated.to_string(), |t| t.to_rfc3339()));
        }
        Err(CacheError::Unavailable) => info!("No cached report yet, waiting for the first refresh"),
        Err(err) => warn!("Existing cache is unreadable: {}", err),
    }

    // Log phase transitions of background refreshes
    let mut status_rx = refresher.subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            debug!("Refresh phase: {:?} (completed cycles: {})", status.phase, status.completed_cycles);
        }
    });

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    println!("Refreshing statistics every {}s (Press Ctrl+C to stop)...", config.refresh_interval.as_secs());
    print_separator();

    let mut last_trigger: Option<Instant> = None;

    while running.load(Ordering::SeqCst) {
        let due = last_trigger.map_or(true, |t| t.elapsed() >= config.refresh_interval);

        if due {
            match refresher.trigger_refresh().await {
                TriggerOutcome::Accepted => info!("Scheduled refresh started"),
                TriggerOutcome::Cooldown { cooldown_remaining_seconds, .. } => {
                    info!("Scheduled refresh skipped, cooldown has {}s left", cooldown_remaining_seconds);
                }
            }
            last_trigger = Some(Instant::now());
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }

    let status = refresher.status();
    if let Some(err) = &status.last_error {
        error!("Last refresh failed: {}", err);
    }
    info!("Shutting down after {} refresh cycles", status.completed_cycles);
    Ok(())
}
