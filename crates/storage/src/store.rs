// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed load/save for the supervisor's durable entities
//!
//! Reads of missing files return the caller-supplied default; a file that
//! exists but fails to decode is an error, so corruption is never silently
//! replaced by a default. Not safe across processes; the controller is the
//! single writer within one process.

use crate::StorageError;
use chrono::{DateTime, Utc};
use ralph_core::BreakerSnapshot;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Rate-limiter call counter (JSON integer).
pub const CALL_COUNT_FILE: &str = ".call_count";
/// Rate-limiter window start (JSON string, ISO-8601).
pub const LAST_RESET_FILE: &str = ".last_reset";
/// Circuit-breaker snapshot (JSON object).
pub const BREAKER_FILE: &str = ".circuit_breaker_state";
/// Exit-signal audit trail (JSON array of strings).
pub const EXIT_SIGNALS_FILE: &str = ".exit_signals";
/// Agent session identifier (raw UTF-8).
pub const SESSION_ID_FILE: &str = ".codex_session_id";

/// Durable state rooted at a project directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load a JSON blob, or `default` when the file does not exist.
    pub fn load_json<T: DeserializeOwned>(
        &self,
        name: &str,
        default: T,
    ) -> Result<T, StorageError> {
        let path = self.root.join(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(default),
            Err(e) => return Err(StorageError::io(&path, e)),
        };
        serde_json::from_str(&content).map_err(|e| StorageError::decode(&path, e))
    }

    /// Save a JSON blob atomically.
    pub fn save_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        let path = self.root.join(name);
        let bytes =
            serde_json::to_vec_pretty(value).map_err(|e| StorageError::decode(&path, e))?;
        write_atomic(&path, &bytes)
    }

    // -- session id --

    /// The persisted session id, if one exists. Absence means "start a new
    /// session on the next invocation".
    pub fn load_session_id(&self) -> Result<Option<String>, StorageError> {
        let path = self.root.join(SESSION_ID_FILE);
        match fs::read_to_string(&path) {
            Ok(raw) => {
                let id = raw.trim().to_string();
                Ok(if id.is_empty() { None } else { Some(id) })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    pub fn save_session_id(&self, id: &str) -> Result<(), StorageError> {
        write_atomic(&self.root.join(SESSION_ID_FILE), id.as_bytes())
    }

    pub fn clear_session_id(&self) -> Result<(), StorageError> {
        let path = self.root.join(SESSION_ID_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    // -- rate limiter --

    pub fn load_call_count(&self) -> Result<u32, StorageError> {
        self.load_json(CALL_COUNT_FILE, 0)
    }

    pub fn save_call_count(&self, count: u32) -> Result<(), StorageError> {
        self.save_json(CALL_COUNT_FILE, &count)
    }

    pub fn load_last_reset(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        self.load_json(LAST_RESET_FILE, None)
    }

    pub fn save_last_reset(&self, when: DateTime<Utc>) -> Result<(), StorageError> {
        self.save_json(LAST_RESET_FILE, &when)
    }

    // -- circuit breaker --

    pub fn load_breaker(&self, default: BreakerSnapshot) -> Result<BreakerSnapshot, StorageError> {
        self.load_json(BREAKER_FILE, default)
    }

    pub fn save_breaker(&self, snapshot: &BreakerSnapshot) -> Result<(), StorageError> {
        self.save_json(BREAKER_FILE, snapshot)
    }

    // -- exit signals --

    pub fn load_exit_signals(&self) -> Result<Vec<String>, StorageError> {
        self.load_json(EXIT_SIGNALS_FILE, Vec::new())
    }

    /// Append a tag to the exit-signal audit trail.
    pub fn append_exit_signal(&self, tag: &str) -> Result<(), StorageError> {
        let mut signals = self.load_exit_signals()?;
        signals.push(tag.to_string());
        self.save_json(EXIT_SIGNALS_FILE, &signals)
    }

    // -- maintenance --

    /// Remove leftover `*.tmp` files from interrupted writes.
    ///
    /// Returns the number of files removed.
    pub fn cleanup(&self) -> Result<usize, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::io(&self.root, e)),
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "tmp") {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        tracing::debug!(path = %path.display(), "removed stale temp file");
                        removed += 1;
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to remove temp file");
                    }
                }
            }
        }
        Ok(removed)
    }
}

/// Write to a sibling `.tmp` path, then rename over the target.
///
/// A failed rename removes the temp file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| StorageError::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(StorageError::io(path, e));
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
