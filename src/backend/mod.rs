//! Blocklist storage backends (live BPF map, simulated record).

mod live;
mod simulated;

use serde::Serialize;
use tracing::{debug, info, warn};

pub use live::LiveBackend;
pub use simulated::SimulatedBackend;

use crate::bpftool::parse_dump_line;
use crate::cmd_abstraction::{args_to_strings, CommandExecutor, RealCommandExecutor};
use crate::codec::{decode, BlockedAddress};
use crate::config::{BackendKind, Config};
use crate::error::BlocklistError;
use crate::locator::TableLocator;

/// Effect of an idempotent mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// The blocklist was modified
    Applied,
    /// The blocklist already had the requested state
    Unchanged,
}

/// Traffic counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrafficStats {
    pub allowed: u64,
    pub blocked: u64,
    pub total: u64,
    /// Placeholder values, not derived from real traffic
    pub illustrative: bool,
}

impl TrafficStats {
    pub fn new(allowed: u64, blocked: u64, illustrative: bool) -> Self {
        Self {
            allowed,
            blocked,
            total: allowed.saturating_add(blocked),
            illustrative,
        }
    }
}

/// Statistics reported by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlocklistStats {
    pub backend: BackendKind,
    pub blocked_rules: usize,
    pub traffic: Option<TrafficStats>,
}

impl BlocklistStats {
    pub fn empty(backend: BackendKind) -> Self {
        Self {
            backend,
            blocked_rules: 0,
            traffic: None,
        }
    }
}

/// Trait for blocklist backends
///
/// Mutations are idempotent: adding a present address or removing an absent
/// one succeeds with [`Change::Unchanged`].
pub trait BlocklistBackend: Send + Sync {
    /// Which backend this is (never `Auto`)
    fn kind(&self) -> BackendKind;

    /// Block an address
    fn add(&self, address: &BlockedAddress) -> Result<Change, BlocklistError>;

    /// Unblock an address
    fn remove(&self, address: &BlockedAddress) -> Result<Change, BlocklistError>;

    /// Enumerate blocked addresses
    fn list(&self) -> Result<Listing, BlocklistError>;

    /// Remove every blocked address, returning how many were removed
    fn clear(&self) -> Result<usize, BlocklistError>;

    /// Entry count and traffic counters
    fn stats(&self) -> Result<BlocklistStats, BlocklistError>;
}

/// A single-pass enumeration of blocked addresses.
///
/// Dump output is decoded lazily as the listing is consumed. Lines that
/// cannot be decoded are skipped and counted in [`Listing::unparsed`].
pub struct Listing {
    source: ListingSource,
    unparsed: usize,
}

enum ListingSource {
    Dump {
        lines: std::vec::IntoIter<String>,
        pending: std::vec::IntoIter<String>,
    },
    Snapshot(std::vec::IntoIter<String>),
}

impl Listing {
    /// Listing over raw `bpftool map dump` output
    pub fn from_dump(output: &str) -> Self {
        let lines: Vec<String> = output.lines().map(str::to_string).collect();
        Self {
            source: ListingSource::Dump {
                lines: lines.into_iter(),
                pending: Vec::new().into_iter(),
            },
            unparsed: 0,
        }
    }

    /// Listing over already-validated entries
    pub fn from_entries(entries: Vec<String>) -> Self {
        Self {
            source: ListingSource::Snapshot(entries.into_iter()),
            unparsed: 0,
        }
    }

    /// Number of entries skipped so far because they could not be decoded
    pub fn unparsed(&self) -> usize {
        self.unparsed
    }
}

impl Iterator for Listing {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match &mut self.source {
            ListingSource::Snapshot(entries) => entries.next(),
            ListingSource::Dump { lines, pending } => loop {
                if let Some(address) = pending.next() {
                    return Some(address);
                }

                let line = lines.next()?;
                let records = match parse_dump_line(&line) {
                    Ok(records) => records,
                    Err(warning) => {
                        warn!("Skipping {}", warning);
                        self.unparsed += 1;
                        continue;
                    }
                };

                let mut decoded = Vec::with_capacity(records.len());
                for record in records {
                    match decode(&record.key) {
                        Ok(address) => decoded.push(address),
                        Err(e) => {
                            warn!("Skipping dump entry in '{}': {}", line.trim(), e);
                            self.unparsed += 1;
                        }
                    }
                }
                *pending = decoded.into_iter();
            },
        }
    }
}

/// Check if running as root (effective UID == 0)
pub fn is_root() -> bool {
    // SAFETY: geteuid() has no preconditions and never fails.
    unsafe { libc::geteuid() == 0 }
}

/// Decide which backend `auto` resolves to.
///
/// Live requires privileges, a working control tool and a discoverable
/// blocklist map.
pub fn detect_backend<E: CommandExecutor>(
    executor: &E,
    config: &Config,
    privileged: bool,
) -> BackendKind {
    if !privileged {
        debug!("Not running as root, using simulated backend");
        return BackendKind::Simulated;
    }

    let tool_ok = executor
        .execute(&config.tool_path, &args_to_strings(&["version"]))
        .map(|o| o.success)
        .unwrap_or(false);
    if !tool_ok {
        debug!("{} not available, using simulated backend", config.tool_path);
        return BackendKind::Simulated;
    }

    match TableLocator::new(executor, &config.tool_path).locate(&config.table_name) {
        Ok(handle) => {
            debug!("Found map '{}' (id {})", config.table_name, handle);
            BackendKind::Live
        }
        Err(e) => {
            debug!("{}, using simulated backend", e);
            BackendKind::Simulated
        }
    }
}

/// Create a blocklist backend based on configuration
pub fn create_backend(config: &Config) -> Box<dyn BlocklistBackend> {
    let kind = match config.backend {
        BackendKind::Auto => {
            let kind = detect_backend(&RealCommandExecutor::new(), config, is_root());
            info!("Auto-selected {} backend", kind);
            kind
        }
        other => other,
    };

    match kind {
        BackendKind::Live => Box::new(LiveBackend::new(config)),
        BackendKind::Simulated | BackendKind::Auto => Box::new(SimulatedBackend::new(config)),
    }
}
