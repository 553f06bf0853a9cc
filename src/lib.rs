//! # xdpguard - Dynamic IP Blocklist Manager for XDP Filters
//!
//! Maintains the set of IPv4 source addresses an XDP program drops. The
//! program consults a BPF hash map (`blocked_ips`, 4-byte big-endian keys,
//! 1-byte presence values); xdpguard edits that map through `bpftool`, or a
//! local record file when no privileged map access is available.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        xdpguard                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)                                                 │
//! │    └── Commands: add, remove, list, clear, stats, check     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Config (serde_yaml)                                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BlocklistManager                                           │
//! │    └── Address validation, uniform error surface            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Backend (BlocklistBackend trait)                           │
//! │    ├── LiveBackend (bpftool + TableLocator)                 │
//! │    └── SimulatedBackend (sorted record file)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Codec + bpftool output parser (pure)                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use xdpguard::config::{BackendKind, Config};
//! use xdpguard::manager::BlocklistManager;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config {
//!         backend: BackendKind::Simulated,
//!         ..Config::default()
//!     };
//!     let manager = BlocklistManager::new(&config);
//!
//!     manager.add("192.168.1.100")?;
//!     for ip in manager.list()? {
//!         println!("{}", ip);
//!     }
//!     manager.clear()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! Every operation blocks on subprocesses or file I/O. The live map is
//! shared with the data plane and any other bpftool user and is never
//! locked, so `clear` may miss entries added while it runs.
//!
//! ## Modules
//!
//! - [`backend`] - Live and simulated backends
//! - [`bpftool`] - Parsers for bpftool text output
//! - [`cli`] - Command-line interface definitions
//! - [`cmd_abstraction`] - Mockable subprocess execution
//! - [`codec`] - Address <-> map key conversion
//! - [`commands`] - CLI command implementations
//! - [`config`] - Configuration parsing and validation
//! - [`error`] - Error types
//! - [`fs_abstraction`] - Mockable filesystem access
//! - [`locator`] - BPF map discovery
//! - [`lock`] - Advisory locking of the simulated record
//! - [`manager`] - Blocklist manager facade
//! - [`utils`] - Output formatting helpers

pub mod backend;
pub mod bpftool;
pub mod cli;
pub mod cmd_abstraction;
pub mod codec;
pub mod commands;
pub mod config;
pub mod error;
pub mod fs_abstraction;
pub mod locator;
pub mod lock;
pub mod manager;
pub mod utils;

pub use config::Config;
pub use error::BlocklistError;
pub use manager::BlocklistManager;
