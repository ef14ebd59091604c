//! On-disk cache for remote calendar payloads.
//!
//! One JSON file per source under the cache directory, named after the
//! SHA-256 of the source key. Entries are replaced by writing a temporary file
//! in the same directory and renaming it over the old one, so readers in other
//! threads or processes never see a partial entry.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::transport::Validators;

/// Default time-to-live of a cache entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

const ENTRY_EXTENSION: &str = "json";

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Returns a [`Clock`] reading the system time.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Errors from the cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt cache entry {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CacheError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A specialized Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// A cached payload and its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Source identity this entry belongs to.
    pub key: String,
    /// SHA-256 of the payload.
    pub fingerprint: String,
    /// When the payload was downloaded.
    pub fetched_at: DateTime<Utc>,
    /// When the entry stops being fresh.
    pub expires_at: DateTime<Utc>,
    /// Validators for conditional requests.
    #[serde(default)]
    pub validators: Validators,
    pub payload: String,
}

impl CacheEntry {
    /// Returns true while `now` is before the expiration.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Summary of the cache directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    /// Sum of payload sizes in bytes.
    pub total_bytes: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    /// Files that could not be read as entries.
    pub corrupt: usize,
}

/// Returns the SHA-256 fingerprint of a payload as lowercase hex.
pub fn fingerprint(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

/// File-backed cache store.
#[derive(Clone)]
pub struct CacheStore {
    dir: PathBuf,
    clock: Clock,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore").field("dir", &self.dir).finish()
    }
}

impl CacheStore {
    /// Opens the store at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> CacheResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
        debug!(dir = %dir.display(), "Opened cache store");
        Ok(Self {
            dir,
            clock: system_clock(),
        })
    }

    /// Replaces the clock used for freshness and timestamps.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the current time according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Returns the file path used for `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!(
            "{}.{}",
            hex::encode(Sha256::digest(key.as_bytes())),
            ENTRY_EXTENSION
        ))
    }

    /// Returns the entry for `key`, fresh or not.
    ///
    /// A corrupt entry is deleted and reported as a miss.
    pub fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let path = self.entry_path(key);
        match read_entry(&path) {
            Ok(entry) if entry.key == key => {
                trace!(key = %key, expires_at = %entry.expires_at, "Cache entry found");
                Ok(Some(entry))
            }
            Ok(entry) => {
                self.discard(
                    &path,
                    &CacheError::Corrupt {
                        path: path.clone(),
                        reason: format!("entry belongs to '{}'", entry.key),
                    },
                );
                Ok(None)
            }
            Err(CacheError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                trace!(key = %key, "Cache miss");
                Ok(None)
            }
            Err(err @ CacheError::Corrupt { .. }) => {
                self.discard(&path, &err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Creates or replaces the entry for `key`.
    pub fn put(
        &self,
        key: &str,
        payload: String,
        fingerprint: String,
        ttl: Duration,
        validators: Validators,
    ) -> CacheResult<CacheEntry> {
        let now = self.now();
        let entry = CacheEntry {
            key: key.to_string(),
            fingerprint,
            fetched_at: now,
            expires_at: expiration(now, ttl),
            validators,
            payload,
        };
        self.write(&entry)?;
        debug!(key = %key, bytes = entry.payload.len(), expires_at = %entry.expires_at, "Stored cache entry");
        Ok(entry)
    }

    /// Moves the expiration of an existing entry, keeping its payload.
    ///
    /// New validators are merged over the stored ones. Returns `None` when
    /// there is no entry for `key`.
    pub fn refresh_expiration(
        &self,
        key: &str,
        ttl: Duration,
        validators: Option<Validators>,
    ) -> CacheResult<Option<CacheEntry>> {
        let Some(mut entry) = self.get(key)? else {
            return Ok(None);
        };
        entry.expires_at = expiration(self.now(), ttl);
        if let Some(validators) = validators {
            entry.validators = validators.or(&entry.validators);
        }
        self.write(&entry)?;
        debug!(key = %key, expires_at = %entry.expires_at, "Extended cache entry");
        Ok(Some(entry))
    }

    /// Removes the entry for `key`. Returns true if one existed.
    pub fn invalidate(&self, key: &str) -> CacheResult<bool> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key = %key, "Invalidated cache entry");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Removes every entry. Returns how many files were deleted.
    pub fn clear(&self) -> CacheResult<usize> {
        let mut removed = 0;
        for path in self.entry_files()? {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::io(&path, e)),
            }
        }
        debug!(removed = removed, "Cleared cache");
        Ok(removed)
    }

    /// Summarizes the entries on disk.
    pub fn stats(&self) -> CacheResult<CacheStats> {
        let mut stats = CacheStats::default();
        for path in self.entry_files()? {
            match read_entry(&path) {
                Ok(entry) => {
                    stats.entries += 1;
                    stats.total_bytes += entry.payload.len() as u64;
                    stats.oldest = Some(
                        stats
                            .oldest
                            .map_or(entry.fetched_at, |t| t.min(entry.fetched_at)),
                    );
                    stats.newest = Some(
                        stats
                            .newest
                            .map_or(entry.fetched_at, |t| t.max(entry.fetched_at)),
                    );
                }
                Err(CacheError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {}
                Err(CacheError::Corrupt { .. }) => stats.corrupt += 1,
                Err(err) => return Err(err),
            }
        }
        Ok(stats)
    }

    fn write(&self, entry: &CacheEntry) -> CacheResult<()> {
        let path = self.entry_path(&entry.key);
        let json = serde_json::to_vec_pretty(entry)?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| CacheError::io(&self.dir, e))?;
        tmp.write_all(&json)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| CacheError::io(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| CacheError::io(&path, e.error))?;
        Ok(())
    }

    fn discard(&self, path: &Path, err: &CacheError) {
        warn!(path = %path.display(), error = %err, "Discarding corrupt cache entry");
        if let Err(e) = fs::remove_file(path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), error = %e, "Failed to remove corrupt cache entry");
        }
    }

    fn entry_files(&self) -> CacheResult<Vec<PathBuf>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.dir, e)),
        };
        let mut files = Vec::new();
        for dir_entry in read_dir {
            let path = dir_entry.map_err(|e| CacheError::io(&self.dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn read_entry(path: &Path) -> CacheResult<CacheEntry> {
    let bytes = fs::read(path).map_err(|e| CacheError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| CacheError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn expiration(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes
            .as_ref()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// A clock that only moves when told to.
    #[derive(Clone)]
    pub(crate) struct ManualClock(Arc<AtomicI64>);

    impl ManualClock {
        pub(crate) fn at(start: DateTime<Utc>) -> Self {
            Self(Arc::new(AtomicI64::new(start.timestamp())))
        }

        pub(crate) fn advance(&self, seconds: i64) {
            self.0.fetch_add(seconds, Ordering::SeqCst);
        }

        pub(crate) fn clock(&self) -> Clock {
            let secs = Arc::clone(&self.0);
            Arc::new(move || {
                Utc.timestamp_opt(secs.load(Ordering::SeqCst), 0)
                    .single()
                    .unwrap_or(DateTime::<Utc>::MIN_UTC)
            })
        }
    }

    pub(crate) fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 20, 8, 0, 0).unwrap()
    }

    fn store() -> (tempfile::TempDir, CacheStore, ManualClock) {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::at(t0());
        let store = CacheStore::open(dir.path().join("cache"))
            .unwrap()
            .with_clock(clock.clock());
        (dir, store, clock)
    }

    const KEY: &str = "https://example.com/work.ics";

    #[test]
    fn put_then_get() {
        let (_dir, store, _) = store();
        assert!(store.get(KEY).unwrap().is_none());

        let stored = store
            .put(KEY, "BEGIN:VCALENDAR".into(), fingerprint("BEGIN:VCALENDAR"), DEFAULT_TTL, Validators::default())
            .unwrap();
        let loaded = store.get(KEY).unwrap().unwrap();
        assert_eq!(loaded, stored);
        assert_eq!(loaded.fetched_at, t0());
        assert_eq!(loaded.expires_at, t0() + TimeDelta::seconds(3600));
    }

    #[test]
    fn freshness_follows_ttl() {
        let (_dir, store, clock) = store();
        store
            .put(KEY, "x".into(), fingerprint("x"), DEFAULT_TTL, Validators::default())
            .unwrap();

        clock.advance(1800);
        let entry = store.get(KEY).unwrap().unwrap();
        assert!(entry.is_fresh(store.now()));

        clock.advance(1900);
        let entry = store.get(KEY).unwrap().unwrap();
        assert!(!entry.is_fresh(store.now()));
        assert_eq!(entry.fingerprint, fingerprint("x"));
    }

    #[test]
    fn refresh_expiration_keeps_payload() {
        let (_dir, store, clock) = store();
        let validators = Validators {
            etag: Some("\"v1\"".into()),
            last_modified: Some("Mon, 20 Oct 2025 08:00:00 GMT".into()),
        };
        store
            .put(KEY, "x".into(), fingerprint("x"), DEFAULT_TTL, validators)
            .unwrap();

        clock.advance(4000);
        let refreshed = store
            .refresh_expiration(
                KEY,
                DEFAULT_TTL,
                Some(Validators {
                    etag: Some("\"v2\"".into()),
                    last_modified: None,
                }),
            )
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.payload, "x");
        assert_eq!(refreshed.fetched_at, t0());
        assert_eq!(refreshed.expires_at, t0() + TimeDelta::seconds(4000 + 3600));
        assert_eq!(refreshed.validators.etag.as_deref(), Some("\"v2\""));
        assert!(refreshed.validators.last_modified.is_some());

        assert!(store
            .refresh_expiration("missing", DEFAULT_TTL, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn corrupt_entry_is_a_miss_and_removed() {
        let (_dir, store, _) = store();
        let path = store.entry_path(KEY);
        fs::write(&path, b"{ not json").unwrap();

        assert!(store.get(KEY).unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn entry_for_another_key_is_discarded() {
        let (_dir, store, _) = store();
        let other = store
            .put("https://example.com/other.ics", "y".into(), fingerprint("y"), DEFAULT_TTL, Validators::default())
            .unwrap();
        let path = store.entry_path(KEY);
        fs::write(&path, serde_json::to_vec(&other).unwrap()).unwrap();

        assert!(store.get(KEY).unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn invalidate_and_clear() {
        let (_dir, store, _) = store();
        for key in ["a", "b", "c"] {
            store
                .put(key, key.into(), fingerprint(key), DEFAULT_TTL, Validators::default())
                .unwrap();
        }
        assert!(store.invalidate("a").unwrap());
        assert!(!store.invalidate("a").unwrap());
        assert_eq!(store.clear().unwrap(), 2);
        assert_eq!(store.stats().unwrap(), CacheStats::default());
    }

    #[test]
    fn stats_summarize_entries() {
        let (_dir, store, clock) = store();
        store
            .put("a", "1234".into(), fingerprint("1234"), DEFAULT_TTL, Validators::default())
            .unwrap();
        clock.advance(60);
        store
            .put("b", "12".into(), fingerprint("12"), DEFAULT_TTL, Validators::default())
            .unwrap();
        fs::write(store.dir().join("garbage.json"), b"nope").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.total_bytes, 6);
        assert_eq!(stats.oldest, Some(t0()));
        assert_eq!(stats.newest, Some(t0() + TimeDelta::seconds(60)));
        assert_eq!(stats.corrupt, 1);
    }

    #[test]
    fn file_name_is_key_hash() {
        let (_dir, store, _) = store();
        let name = store.entry_path("abc").file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(
            name,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad.json"
        );
    }

    #[test]
    fn no_temporary_files_left_behind() {
        let (_dir, store, _) = store();
        store
            .put(KEY, "x".into(), fingerprint("x"), DEFAULT_TTL, Validators::default())
            .unwrap();
        store
            .put(KEY, "y".into(), fingerprint("y"), DEFAULT_TTL, Validators::default())
            .unwrap();
        let files: Vec<_> = fs::read_dir(store.dir()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(store.get(KEY).unwrap().unwrap().payload, "y");
    }
}
