// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ralph-storage: Durable state for the loop supervisor
//!
//! All durable state is small JSON blobs in the project directory, written
//! atomically (sibling temp file, then rename). Persistence is best-effort:
//! a relaunch resumes from whatever was last written.

mod archive;
mod store;

pub use archive::{archive_session, SessionArchive, ARCHIVE_DIR};
pub use store::{StateStore, BREAKER_FILE, CALL_COUNT_FILE, EXIT_SIGNALS_FILE, LAST_RESET_FILE, SESSION_ID_FILE};

use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed state file {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn decode(path: &std::path::Path, source: serde_json::Error) -> Self {
        StorageError::Decode {
            path: path.display().to_string(),
            source,
        }
    }
}
