// src/cache/cooldown.rs
//
// Refresh-attempt marker. Stored next to the cache and written with the same
// atomic replace, so it also gates refreshes started by other processes.
// The last attempt is also held in memory, so the gate keeps working in this
// process when the marker cannot be written or read.

use log::warn;
use serde::{Serialize, Deserialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use super::store::write_atomic;

pub const MARKER_FILE: &str = "last_refresh.json";

/// In-memory value before any attempt was recorded
const NO_ATTEMPT: i64 = i64::MIN;

#[derive(Debug, Serialize, Deserialize)]
struct RefreshMarker {
    /// Milliseconds since the Unix epoch
    last_attempt: i64,
}

#[derive(Debug)]
pub struct CooldownGate {
    dir: PathBuf,
    window: Duration,
    local_attempt: AtomicI64,
}

impl CooldownGate {
    pub fn new(dir: impl Into<PathBuf>, window: Duration) -> Self {
        Self {
            dir: dir.into(),
            window,
            local_attempt: AtomicI64::new(NO_ATTEMPT),
        }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(MARKER_FILE)
    }

    /// Latest attempt seen by this process or recorded in the marker
    pub fn last_attempt(&self) -> Option<i64> {
        let local = match self.local_attempt.load(Ordering::SeqCst) {
            NO_ATTEMPT => None,
            at => Some(at),
        };
        local.max(self.marker_attempt())
    }

    /// Time stored in the marker, `None` if never written or unreadable
    fn marker_attempt(&self) -> Option<i64> {
        let contents = match fs::read_to_string(self.path()) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("Failed to read refresh marker: {}", err);
                return None;
            }
        };
        match serde_json::from_str::<RefreshMarker>(&contents) {
            Ok(marker) => Some(marker.last_attempt),
            Err(err) => {
                warn!("Ignoring corrupt refresh marker: {}", err);
                None
            }
        }
    }

    /// Time left in the cooldown window at `now_ms`, `None` once it has elapsed
    pub fn remaining(&self, now_ms: i64) -> Option<Duration> {
        let last = self.last_attempt()?;
        let elapsed = Duration::from_millis(now_ms.saturating_sub(last).max(0) as u64);
        self.window.checked_sub(elapsed).filter(|left| !left.is_zero())
    }

    /// Remember the attempt in memory, then persist it to the marker
    pub fn record_attempt(&self, now_ms: i64) -> io::Result<()> {
        self.local_attempt.fetch_max(now_ms, Ordering::SeqCst);
        let bytes = serde_json::to_vec(&RefreshMarker { last_attempt: now_ms })?;
        write_atomic(&self.dir, &self.path(), &bytes)
    }
}

/// Whole seconds left, rounded up so a pending window never reports zero
pub fn remaining_seconds(remaining: Duration) -> u64 {
    let millis = remaining.as_millis() as u64;
    ((millis + 999) / 1000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_no_marker_means_no_cooldown() {
        let dir = tempdir().unwrap();
        let gate = CooldownGate::new(dir.path(), Duration::from_secs(60));
        assert_eq!(gate.last_attempt(), None);
        assert_eq!(gate.remaining(1_000_000), None);
    }

    #[test]
    fn test_window_from_last_attempt() {
        let dir = tempdir().unwrap();
        let gate = CooldownGate::new(dir.path(), Duration::from_secs(60));
        gate.record_attempt(1_000_000).unwrap();

        assert_eq!(gate.last_attempt(), Some(1_000_000));
        assert_eq!(gate.remaining(1_000_000), Some(Duration::from_secs(60)));
        assert_eq!(gate.remaining(1_045_500), Some(Duration::from_millis(14_500)));
        assert_eq!(gate.remaining(1_060_000), None);
        assert_eq!(gate.remaining(2_000_000), None);
    }

    #[test]
    fn test_corrupt_marker_is_ignored() {
        let dir = tempdir().unwrap();
        let gate = CooldownGate::new(dir.path(), Duration::from_secs(60));
        fs::write(dir.path().join(MARKER_FILE), "garbage").unwrap();
        assert_eq!(gate.remaining(0), None);
    }

    #[test]
    fn test_unwritable_marker_still_gates() {
        let dir = tempdir().unwrap();
        // A regular file where the cache directory should be
        let blocked = dir.path().join("not-a-dir");
        fs::write(&blocked, "").unwrap();
        let gate = CooldownGate::new(&blocked, Duration::from_secs(60));

        assert!(gate.record_attempt(1_000_000).is_err());
        assert_eq!(gate.last_attempt(), Some(1_000_000));
        assert_eq!(gate.remaining(1_030_000), Some(Duration::from_secs(30)));
        assert_eq!(gate.remaining(1_060_000), None);
    }

    #[test]
    fn test_newer_marker_wins_over_local_attempt() {
        let dir = tempdir().unwrap();
        let gate = CooldownGate::new(dir.path(), Duration::from_secs(60));
        let other = CooldownGate::new(dir.path(), Duration::from_secs(60));

        gate.record_attempt(1_000_000).unwrap();
        other.record_attempt(1_050_000).unwrap();
        assert_eq!(gate.last_attempt(), Some(1_050_000));
        assert_eq!(gate.remaining(1_100_000), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_remaining_seconds_rounds_up() {
        assert_eq!(remaining_seconds(Duration::from_millis(14_500)), 15);
        assert_eq!(remaining_seconds(Duration::from_secs(60)), 60);
        assert_eq!(remaining_seconds(Duration::from_millis(1)), 1);
    }
}
