//! Blocklist manager: one backend, one uniform operation surface.

use tracing::{debug, warn};

use crate::backend::{create_backend, BlocklistBackend, BlocklistStats, Change, Listing};
use crate::codec::BlockedAddress;
use crate::config::{BackendKind, Config};
use crate::error::BlocklistError;

/// Facade over the backend chosen at construction.
///
/// Each call validates its input before touching the backend. Nothing is
/// retried; callers that want retries wrap these calls.
pub struct BlocklistManager {
    backend: Box<dyn BlocklistBackend>,
}

impl BlocklistManager {
    /// Build a manager, resolving `auto` to a concrete backend once.
    pub fn new(config: &Config) -> Self {
        Self::with_backend(create_backend(config))
    }

    pub fn with_backend(backend: Box<dyn BlocklistBackend>) -> Self {
        debug!("Using {} backend", backend.kind());
        Self { backend }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn add(&self, address: &str) -> Result<Change, BlocklistError> {
        let address = BlockedAddress::parse(address)?;
        self.backend.add(&address)
    }

    pub fn remove(&self, address: &str) -> Result<Change, BlocklistError> {
        let address = BlockedAddress::parse(address)?;
        self.backend.remove(&address)
    }

    pub fn list(&self) -> Result<Listing, BlocklistError> {
        self.backend.list()
    }

    pub fn clear(&self) -> Result<usize, BlocklistError> {
        self.backend.clear()
    }

    /// Whether `address` is currently blocked.
    pub fn contains(&self, address: &str) -> Result<bool, BlocklistError> {
        let address = BlockedAddress::parse(address)?.to_string();
        Ok(self.backend.list()?.any(|entry| entry == address))
    }

    /// Never fails: an unreachable backend reports empty statistics.
    pub fn stats(&self) -> BlocklistStats {
        match self.backend.stats() {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Could not read blocklist statistics: {}", e);
                BlocklistStats::empty(self.backend.kind())
            }
        }
    }
}
