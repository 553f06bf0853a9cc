//! Error types for xdpguard.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlocklistError {
    #[error("Invalid IP address: '{0}' (expected a dotted-quad IPv4 address)")]
    InvalidAddress(String),

    #[error("Invalid table key: expected 4 bytes, got {0}")]
    InvalidKey(usize),

    #[error("BPF map '{0}' not found. Make sure the XDP program is loaded")]
    TableNotFound(String),

    #[error("Failed to {operation} {address}: {stderr}")]
    BackendWriteFailed {
        operation: &'static str,
        address: String,
        stderr: String,
    },

    #[error("Storage error on {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BlocklistError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}
