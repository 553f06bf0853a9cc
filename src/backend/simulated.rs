//! Simulated backend: a sorted text record standing in for the BPF map.
//!
//! Record format: one address per line, sorted as plain text (so
//! `10.0.0.10` precedes `10.0.0.9`), no duplicates, every line
//! newline-terminated, no header.
//!
//! Lines that are not a dotted-quad IPv4 address (IPv6 text written by other
//! tools, hand edits) are not listed or counted, but a rewrite keeps them in
//! place. Surrounding whitespace, blank lines and duplicates are dropped on
//! the next write.
//!
//! With `lock_record` set, every mutation holds an advisory lock on
//! `<record>.lock`. The sidecar is created on first use and never removed:
//! unlinking it would let a waiting process lock a stale inode.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{BlocklistBackend, BlocklistStats, Change, Listing, TrafficStats};
use crate::codec::BlockedAddress;
use crate::config::{BackendKind, Config};
use crate::error::BlocklistError;
use crate::fs_abstraction::{FileSystem, RealFileSystem};
use crate::lock::RecordLock;

/// Placeholder packet counters; there is no data plane behind this backend.
const PLACEHOLDER_ALLOWED: u64 = 1234;
const PLACEHOLDER_BLOCKED: u64 = 56;

/// Record contents, keyed by line text.
struct Record {
    lines: BTreeSet<String>,
}

impl Record {
    fn is_address(line: &str) -> bool {
        BlockedAddress::parse(line).is_ok()
    }

    /// Valid addresses in record order.
    fn addresses(&self) -> impl Iterator<Item = &String> + '_ {
        self.lines.iter().filter(|line| Self::is_address(line))
    }

    fn foreign_lines(&self) -> impl Iterator<Item = &String> + '_ {
        self.lines.iter().filter(|line| !Self::is_address(line))
    }

    fn len(&self) -> usize {
        self.addresses().count()
    }

    fn render(&self) -> String {
        self.lines.iter().map(|line| format!("{}\n", line)).collect()
    }
}

pub struct SimulatedBackend<F: FileSystem = RealFileSystem> {
    fs: F,
    record_path: PathBuf,
    lock_record: bool,
}

impl SimulatedBackend<RealFileSystem> {
    pub fn new(config: &Config) -> Self {
        Self::with_fs(RealFileSystem, &config.record_path, config.lock_record)
    }
}

impl<F: FileSystem> SimulatedBackend<F> {
    pub fn with_fs(fs: F, record_path: &Path, lock_record: bool) -> Self {
        Self {
            fs,
            record_path: record_path.to_path_buf(),
            lock_record,
        }
    }

    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    fn storage_err(&self, e: io::Error) -> BlocklistError {
        BlocklistError::storage(&self.record_path, e)
    }

    fn ensure_parent(&self) -> Result<(), BlocklistError> {
        match self.record_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !self.fs.exists(parent) => self
                .fs
                .create_dir_all(parent)
                .map_err(|e| BlocklistError::storage(parent, e)),
            _ => Ok(()),
        }
    }

    /// Prepare for a read-modify-write cycle.
    fn begin_mutation(&self) -> Result<Option<RecordLock>, BlocklistError> {
        self.ensure_parent()?;
        if self.lock_record {
            Ok(Some(RecordLock::acquire(&self.record_path)?))
        } else {
            Ok(None)
        }
    }

    /// Read the whole record. A missing record is an empty blocklist.
    fn load(&self) -> Result<Record, BlocklistError> {
        let mut lines = BTreeSet::new();
        if !self.fs.exists(&self.record_path) {
            return Ok(Record { lines });
        }

        let content = match self.fs.read_to_string(&self.record_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Record { lines }),
            Err(e) => return Err(self.storage_err(e)),
        };

        lines.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
        let record = Record { lines };

        for line in record.foreign_lines() {
            warn!(
                "Skipping non-IPv4 line in {}: '{}'",
                self.record_path.display(),
                line
            );
        }
        Ok(record)
    }

    fn persist(&self, record: &Record) -> Result<(), BlocklistError> {
        self.fs
            .write_atomic(&self.record_path, record.render().as_bytes())
            .map_err(|e| self.storage_err(e))?;
        debug!(
            "Wrote {} lines to {}",
            record.lines.len(),
            self.record_path.display()
        );
        Ok(())
    }
}

impl<F: FileSystem> BlocklistBackend for SimulatedBackend<F> {
    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    fn add(&self, address: &BlockedAddress) -> Result<Change, BlocklistError> {
        let _lock = self.begin_mutation()?;
        let mut record = self.load()?;

        if !record.lines.insert(address.to_string()) {
            debug!("{} is already blocked", address);
            return Ok(Change::Unchanged);
        }

        self.persist(&record)?;
        info!("Blocked {} (simulated)", address);
        Ok(Change::Applied)
    }

    fn remove(&self, address: &BlockedAddress) -> Result<Change, BlocklistError> {
        let _lock = self.begin_mutation()?;
        let mut record = self.load()?;

        if !record.lines.remove(&address.to_string()) {
            debug!("{} is not in the blocked list", address);
            return Ok(Change::Unchanged);
        }

        self.persist(&record)?;
        info!("Unblocked {} (simulated)", address);
        Ok(Change::Applied)
    }

    fn list(&self) -> Result<Listing, BlocklistError> {
        let record = self.load()?;
        Ok(Listing::from_entries(record.addresses().cloned().collect()))
    }

    /// Removes the record file, foreign lines included. Returns the number
    /// of addresses it held.
    fn clear(&self) -> Result<usize, BlocklistError> {
        let _lock = self.begin_mutation()?;
        if !self.fs.exists(&self.record_path) {
            return Ok(0);
        }
        let count = self.load()?.len();

        match self.fs.remove_file(&self.record_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(self.storage_err(e)),
        }

        info!("Cleared {} entries (simulated)", count);
        Ok(count)
    }

    fn stats(&self) -> Result<BlocklistStats, BlocklistError> {
        Ok(BlocklistStats {
            backend: BackendKind::Simulated,
            blocked_rules: self.load()?.len(),
            traffic: Some(TrafficStats::new(
                PLACEHOLDER_ALLOWED,
                PLACEHOLDER_BLOCKED,
                true,
            )),
        })
    }
}
