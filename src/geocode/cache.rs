//! File-backed geocode cache at `<data_dir>/geocode_cache.json`.
//!
//! Keys are the original, unnormalized address strings. Values are a
//! coordinate or `null` for an address that failed to resolve; failures are
//! cached too so they are not looked up again. No TTL: deleting the file is
//! the only reset.
//!
//! The whole map is rewritten on every insert. Writes go to a sibling temp
//! file that is then renamed over the target, so a crash mid-write never
//! leaves a truncated cache behind.

use super::types::{CacheError, Coordinate, Resolution};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The geocode cache.
pub struct GeocodeCache {
    /// `None` runs the cache purely in memory.
    path: Option<PathBuf>,
    entries: BTreeMap<String, Option<Coordinate>>,
}

impl GeocodeCache {
    /// Load the cache file. A missing file starts empty; an unreadable or
    /// corrupt one is reported and also starts empty.
    pub fn load_from(path: PathBuf) -> Self {
        let entries = match Self::read_file(&path) {
            Ok(entries) => {
                info!(path = %path.display(), entries = entries.len(), "loaded geocode cache");
                entries
            }
            Err(CacheError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no geocode cache yet, starting empty");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "geocode cache unreadable, starting empty");
                BTreeMap::new()
            }
        };
        Self { path: Some(path), entries }
    }

    /// A cache that never touches disk.
    pub fn in_memory() -> Self {
        Self { path: None, entries: BTreeMap::new() }
    }

    fn read_file(path: &Path) -> Result<BTreeMap<String, Option<Coordinate>>, CacheError> {
        let data = fs::read_to_string(path)?;
        let data = data.trim_start_matches('\u{FEFF}');
        Ok(serde_json::from_str(data)?)
    }

    /// Look up an address by its exact original text.
    ///
    /// Returns `None` on a miss, `Some(Resolution::NotFound)` for a cached
    /// failure.
    pub fn get(&self, address: &str) -> Option<Resolution> {
        self.entries.get(address).map(|entry| match entry {
            Some(c) => Resolution::Resolved(*c),
            None => Resolution::NotFound,
        })
    }

    /// Record an outcome and flush the whole cache to disk.
    ///
    /// The in-memory entry is kept even when the flush fails.
    pub fn put(&mut self, address: &str, value: Option<Coordinate>) -> Result<(), CacheError> {
        self.entries.insert(address.to_string(), value);
        self.flush()
    }

    /// Rewrite the cache file atomically (temp file + rename).
    pub fn flush(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
