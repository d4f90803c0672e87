use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::fingerprint::fingerprint;
use crate::model::{Units, WeatherSnapshot};

const CACHE_SUBDIR: &str = "weather-dashboard";
const ENTRY_EXTENSION: &str = "json";
/// Upper bound on entry lifetime so expiry timestamps stay representable.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

static TMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub lat: f64,
    pub lon: f64,
    pub units: Units,
    pub snapshot: WeatherSnapshot,
    pub created_at: String,
    pub expires_at: String,
}

impl CacheEntry {
    pub fn new(
        lat: f64,
        lon: f64,
        units: Units,
        snapshot: WeatherSnapshot,
        now: DateTime<Utc>,
        ttl_secs: u64,
    ) -> Self {
        let ttl = Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64);
        Self {
            fingerprint: fingerprint(lat, lon, units),
            lat,
            lon,
            units,
            snapshot,
            created_at: format_timestamp(now),
            expires_at: format_timestamp(now + ttl),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.expires_at)
    }

    /// An entry serves hits up to and including its expiry instant.
    pub fn is_servable_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| now <= expires_at)
    }

    /// Sweep predicate; entries with an unreadable expiry are treated as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_none_or(|expires_at| expires_at < now)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt cache entry at {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("failed to encode cache entry: {0}")]
    Encode(String),
}

impl CacheError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Backing store for the TTL cache: upsert-by-fingerprint, point lookup and
/// expiry-based deletion.
pub trait CacheStore: Send + Sync {
    fn load(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError>;
    /// Inserts or replaces the entry for `entry.fingerprint`. Concurrent upserts
    /// on one fingerprint must leave exactly one complete entry behind.
    fn upsert(&self, entry: &CacheEntry) -> Result<(), CacheError>;
    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError>;
    fn clear(&self) -> Result<usize, CacheError>;
    fn entries(&self) -> Result<Vec<CacheEntry>, CacheError>;
}

/// One JSON document per fingerprint under `<cache_dir>/weather-dashboard/`.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            dir: cache_dir.join(CACHE_SUBDIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{fingerprint}.{ENTRY_EXTENSION}"))
    }

    fn entry_paths(&self) -> Result<Vec<PathBuf>, CacheError> {
        let listing = match fs::read_dir(&self.dir) {
            Ok(listing) => listing,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(CacheError::io(&self.dir, error)),
        };

        let mut paths = Vec::new();
        for item in listing {
            let path = item.map_err(|error| CacheError::io(&self.dir, error))?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn read_entry(path: &Path) -> Result<Option<CacheEntry>, CacheError> {
        let payload = match fs::read_to_string(path) {
            Ok(payload) => payload,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(CacheError::io(path, error)),
        };

        serde_json::from_str::<CacheEntry>(&payload)
            .map(Some)
            .map_err(|error| CacheError::Corrupt {
                path: path.to_path_buf(),
                message: error.to_string(),
            })
    }

    fn remove(path: &Path) -> Result<bool, CacheError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(CacheError::io(path, error)),
        }
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError> {
        Self::read_entry(&self.path_for(fingerprint))
    }

    fn upsert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let payload =
            serde_json::to_vec(entry).map_err(|error| CacheError::Encode(error.to_string()))?;
        write_atomic(&self.path_for(&entry.fingerprint), &payload)
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let mut removed = 0;
        for path in self.entry_paths()? {
            let expired = match Self::read_entry(&path) {
                Ok(Some(entry)) => entry.is_expired_at(now),
                Ok(None) => false,
                // Unreadable documents can never serve a hit again.
                Err(CacheError::Corrupt { .. }) => true,
                Err(error) => return Err(error),
            };
            if expired && Self::remove(&path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for path in self.entry_paths()? {
            if Self::remove(&path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let mut entries = Vec::new();
        for path in self.entry_paths()? {
            match Self::read_entry(&path) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(CacheError::Corrupt { path, message }) => {
                    debug!(path = %path.display(), %message, "skipping corrupt cache entry");
                }
                Err(error) => return Err(error),
            }
        }
        Ok(entries)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let parent = path.parent().ok_or_else(|| {
        CacheError::io(
            path,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "cache path must have a parent directory",
            ),
        )
    })?;
    fs::create_dir_all(parent).map_err(|error| CacheError::io(parent, error))?;

    let sequence = TMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let tmp_path = path.with_extension(format!("{}.{sequence}.tmp", std::process::id()));
    fs::write(&tmp_path, bytes).map_err(|error| CacheError::io(&tmp_path, error))?;
    fs::rename(&tmp_path, path).map_err(|error| {
        let _ = fs::remove_file(&tmp_path);
        CacheError::io(path, error)
    })
}

/// In-process store; the mutex makes each upsert atomic per fingerprint.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, CacheEntry>) -> T) -> T {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.with_entries(|entries| entries.get(fingerprint).cloned()))
    }

    fn upsert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.with_entries(|entries| {
            entries.insert(entry.fingerprint.clone(), entry.clone());
        });
        Ok(())
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        Ok(self.with_entries(|entries| {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired_at(now));
            before - entries.len()
        }))
    }

    fn clear(&self) -> Result<usize, CacheError> {
        Ok(self.with_entries(|entries| {
            let removed = entries.len();
            entries.clear();
            removed
        }))
    }

    fn entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        Ok(self.with_entries(|entries| entries.values().cloned().collect()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsentReason {
    NotFound,
    Expired,
    /// The backing store failed; the failure has already been logged.
    Unavailable,
}

/// Outcome of a cache read. Every store failure collapses into
/// `Absent(Unavailable)`, so callers cannot fail a request because of the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(Box<CacheEntry>),
    Absent(AbsentReason),
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    pub fn into_snapshot(self) -> Option<WeatherSnapshot> {
        match self {
            Self::Hit(entry) => Some(entry.snapshot),
            Self::Absent(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
    pub ttl_secs: u64,
}

/// Best-effort TTL cache of weather snapshots keyed by coordinate fingerprint.
#[derive(Debug)]
pub struct TtlCache<S> {
    store: S,
    ttl_secs: u64,
}

impl<S: CacheStore> TtlCache<S> {
    pub fn new(store: S, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn lookup(&self, lat: f64, lon: f64, units: Units, now: DateTime<Utc>) -> CacheLookup {
        let key = fingerprint(lat, lon, units);
        match self.store.load(&key) {
            Ok(Some(entry)) if entry.is_servable_at(now) => {
                debug!(fingerprint = %key, "weather cache hit");
                CacheLookup::Hit(Box::new(entry))
            }
            Ok(Some(_)) => {
                debug!(fingerprint = %key, "weather cache entry expired");
                CacheLookup::Absent(AbsentReason::Expired)
            }
            Ok(None) => {
                debug!(fingerprint = %key, "weather cache miss");
                CacheLookup::Absent(AbsentReason::NotFound)
            }
            Err(error) => {
                warn!(fingerprint = %key, %error, "weather cache read failed");
                CacheLookup::Absent(AbsentReason::Unavailable)
            }
        }
    }

    pub fn get(&self, lat: f64, lon: f64, units: Units, now: DateTime<Utc>) -> Option<WeatherSnapshot> {
        self.lookup(lat, lon, units, now).into_snapshot()
    }

    pub fn set(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
        snapshot: &WeatherSnapshot,
        now: DateTime<Utc>,
    ) {
        let entry = CacheEntry::new(lat, lon, units, snapshot.clone(), now, self.ttl_secs);
        match self.store.upsert(&entry) {
            Ok(()) => debug!(fingerprint = %entry.fingerprint, expires_at = %entry.expires_at, "weather cache stored"),
            Err(error) => warn!(fingerprint = %entry.fingerprint, %error, "weather cache write failed"),
        }
    }

    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        self.store.delete_expired(now).unwrap_or_else(|error| {
            warn!(%error, "weather cache sweep failed");
            0
        })
    }

    pub fn clear_all(&self) -> usize {
        self.store.clear().unwrap_or_else(|error| {
            warn!(%error, "weather cache clear failed");
            0
        })
    }

    pub fn stats(&self, now: DateTime<Utc>) -> CacheStats {
        let entries = self.store.entries().unwrap_or_else(|error| {
            warn!(%error, "weather cache stats failed");
            Vec::new()
        });
        let total_entries = entries.len();
        let expired_entries = entries
            .iter()
            .filter(|entry| entry.is_expired_at(now))
            .count();

        CacheStats {
            total_entries,
            expired_entries,
            active_entries: total_entries - expired_entries,
            ttl_secs: self.ttl_secs,
        }
    }
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|value| value.with_timezone(&Utc))
}
