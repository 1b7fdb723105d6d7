//! Error types for the tail subsystem.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by path resolution, attach and follow operations.
#[derive(Error, Debug)]
pub enum TailError {
    #[error("no filename given")]
    EmptyName,

    #[error("path {name:?} escapes the tail root {root}")]
    OutsideRoot { name: String, root: PathBuf },

    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read failed on {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to initialize file watcher: {reason}")]
    WatchInit { reason: String },

    #[error("tail service stopped")]
    ServiceStopped,
}

impl From<notify::Error> for TailError {
    fn from(e: notify::Error) -> Self {
        TailError::WatchInit {
            reason: e.to_string(),
        }
    }
}
