// src/cache/store.rs
//
// Persistence for the cached report. Every write goes to a temporary file in
// the cache directory and is renamed over the target, so readers only ever see
// a complete file.

use log::{debug, info};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CacheError, RefreshError};
use crate::stats::CacheEntry;

/// Canonical cache file name inside the cache directory
pub const CACHE_FILE: &str = "stats.json";

/// Prefix shared by every temporary file the store creates
const TEMP_PREFIX: &str = ".flux-stats-";

/// Temp files older than this belong to a writer that died
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE)
    }

    /// Read the last complete entry
    pub fn load(&self) -> Result<CacheEntry, CacheError> {
        let contents = match fs::read_to_string(self.path()) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(CacheError::Unavailable),
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    /// Replace the cached entry atomically
    pub fn save(&self, entry: &CacheEntry) -> Result<PathBuf, RefreshError> {
        let bytes = serde_json::to_vec(entry)?;
        let path = self.path();
        write_atomic(&self.dir, &path, &bytes)?;
        Ok(path)
    }

    /// Delete temporary files left by crashed writers, returning how many went.
    ///
    /// Only files with the store's prefix that are at least `older_than` old
    /// are removed, so an in-flight write from another process is left alone.
    pub fn sweep_stale_temp_files(&self, older_than: Duration) -> io::Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let is_temp = entry
                .file_name()
                .to_str()
                .map_or(false, |name| name.starts_with(TEMP_PREFIX));
            if !is_temp {
                continue;
            }

            let age = entry
                .metadata()?
                .modified()?
                .elapsed()
                .unwrap_or(Duration::ZERO);
            if age >= older_than {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Removed {} stale temp files from {}", removed, self.dir.display());
        }
        Ok(removed)
    }
}

/// Write `bytes` to `target` through a synced temporary file in `dir`.
///
/// On any failure the temporary file is removed and `target` is untouched.
pub fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> io::Result<()> {
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;

    debug!("Renaming {} over {}", temp.path().display(), target.display());
    // The returned error owns the temp file; dropping it deletes the file
    temp.persist(target).map_err(|err| err.error)?;

    // Make the rename itself durable
    #[cfg(unix)]
    fs::File::open(dir)?.sync_all()?;

    Ok(())
}
