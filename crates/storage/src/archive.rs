// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session archive records
//!
//! When a session is rotated (context threshold hit, or the server
//! announced compaction), a snapshot of its token accounting is archived
//! under `.ralph/sessions/` before the fresh session takes over.

use crate::store::write_atomic;
use crate::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Archive directory, relative to the project root.
pub const ARCHIVE_DIR: &str = ".ralph/sessions";

/// One archived session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionArchive {
    pub model_id: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub loop_num: u64,
    pub timestamp: DateTime<Utc>,
    /// Why the session was rotated: `threshold` or `server_compacted`.
    pub reason: String,
}

/// Write an archive record, returning the path it landed at.
///
/// Filenames are `session_<YYYYMMDD_HHMMSS>_<id8>.json`; the short random
/// suffix keeps same-second rotations from colliding.
pub fn archive_session(root: &Path, record: &SessionArchive) -> Result<PathBuf, StorageError> {
    let stamp = record.timestamp.format("%Y%m%d_%H%M%S");
    let name = format!("session_{stamp}_{}.json", short_random_hex(8));
    let path = root.join(ARCHIVE_DIR).join(name);

    let bytes = serde_json::to_vec_pretty(record).map_err(|e| StorageError::decode(&path, e))?;
    write_atomic(&path, &bytes)?;
    tracing::info!(path = %path.display(), reason = %record.reason, "archived session");
    Ok(path)
}

/// Generate a short random hex string.
fn short_random_hex(len: usize) -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..len)
        .map(|_| format!("{:x}", rng.random::<u8>() % 16))
        .collect()
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
