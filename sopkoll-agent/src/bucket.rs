//! Versioned, file-backed cache bucket for stored HTTP responses.
//!
//! One bucket is one JSON file named after the bucket under the cache dir.
//! The bucket name embeds a version suffix; bumping [`CACHE_NAME`] is the
//! mechanism that invalidates every previously cached entry on deploy.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::fs;

use sopkoll_core::model::GatewayResponse;

use crate::AgentError;

/// Current bucket name. Bump the suffix to drop all cached entries.
pub const CACHE_NAME: &str = "sopkoll-cache-v1";

/// Named collection of stored responses keyed by request URL.
///
/// Also holds the notification dedup flags under synthetic `/notify-flag/`
/// keys, mirroring how the rest of the cache is keyed.
pub struct CacheBucket {
    path: PathBuf,
    name: String,
    entries: Mutex<HashMap<String, GatewayResponse>>,
}

impl CacheBucket {
    /// Open (or create) the bucket with the given name under `dir`.
    ///
    /// A bucket file that no longer decodes is discarded rather than
    /// failing the agent.
    ///
    /// # Errors
    ///
    /// Returns an [`AgentError`] when the bucket file exists but cannot be
    /// read.
    pub fn open(dir: &Path, name: &str) -> Result<Self, AgentError> {
        let path = bucket_path(dir, name);
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(bucket = name, %err, "discarding undecodable cache bucket");
                HashMap::new()
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            name: name.to_owned(),
            entries: Mutex::new(entries),
        })
    }

    /// The bucket's versioned name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a response under the given key, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an [`AgentError`] when persisting the bucket fails.
    pub fn put(&self, key: &str, response: GatewayResponse) -> Result<(), AgentError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), response);
        self.persist(&entries)
    }

    /// Best stored match for the key, if any.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<GatewayResponse> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    /// Whether an entry exists for the exact key.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(key)
    }

    /// Whether any stored key contains the given fragment.
    ///
    /// Used by the reminder check to ask "is there any cached schedule
    /// response at all" without decoding anything.
    #[must_use]
    pub fn has_key_containing(&self, fragment: &str) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.keys().any(|key| key.contains(fragment))
    }

    fn persist(&self, entries: &HashMap<String, GatewayResponse>) -> Result<(), AgentError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Delete every bucket under `dir` whose name differs from `keep`.
///
/// This is the activate transition: old versions disappear, the current
/// bucket is untouched, and control is taken over immediately.
///
/// # Errors
///
/// Returns an [`AgentError`] when the cache dir cannot be enumerated.
pub fn remove_stale_buckets(dir: &Path, keep: &str) -> Result<usize, AgentError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err.into()),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let stale = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem != keep);
        if stale {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn bucket_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}
