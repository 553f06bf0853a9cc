//! Configuration management for xdpguard.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/xdpguard/config.yaml";

/// Longest map name the kernel keeps (BPF_OBJ_NAME_LEN minus the NUL).
const MAX_MAP_NAME_LEN: usize = 15;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Blocklist backend (auto, live, simulated)
    pub backend: BackendKind,

    /// Name of the BPF hash map holding blocked addresses
    pub table_name: String,

    /// Name of the BPF array map holding packet counters
    pub counter_table: String,

    /// Control tool used to reach the live maps
    pub tool_path: String,

    /// Record file used by the simulated backend
    pub record_path: PathBuf,

    /// Take an advisory lock on the record while mutating it
    pub lock_record: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            table_name: "blocked_ips".to_string(),
            counter_table: "pkt_count".to_string(),
            tool_path: "bpftool".to_string(),
            record_path: PathBuf::from("/tmp/blocked_ips_demo.txt"),
            lock_record: true,
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (field, name) in [
            ("table_name", &self.table_name),
            ("counter_table", &self.counter_table),
        ] {
            if name.is_empty() {
                anyhow::bail!("{} cannot be empty", field);
            }
            if name.len() > MAX_MAP_NAME_LEN {
                anyhow::bail!(
                    "{} '{}' is longer than {} characters; the kernel truncates map names",
                    field,
                    name,
                    MAX_MAP_NAME_LEN
                );
            }
            if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
                anyhow::bail!("{} '{}' contains invalid characters", field, name);
            }
        }

        if self.tool_path.trim().is_empty() {
            anyhow::bail!("tool_path cannot be empty");
        }

        if self.record_path.as_os_str().is_empty() {
            anyhow::bail!("record_path cannot be empty");
        }

        Ok(())
    }
}

/// Backend selection
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Live when the map is reachable, simulated otherwise
    #[default]
    Auto,
    /// Kernel BPF map through bpftool
    Live,
    /// Local record file
    Simulated,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendKind::Auto => "auto",
            BackendKind::Live => "live",
            BackendKind::Simulated => "simulated",
        };
        f.write_str(name)
    }
}
