//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{BackendKind, Config, DEFAULT_CONFIG_PATH};

#[derive(Parser)]
#[command(name = "xdpguard")]
#[command(author, version, about = "Dynamic IP blocklist manager for XDP filters")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Backend override (auto, live, simulated)
    #[arg(short, long, value_enum, global = true)]
    pub backend: Option<BackendKind>,

    /// Record file override for the simulated backend
    #[arg(long, global = true)]
    pub record: Option<PathBuf>,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Load the config file (or defaults) and apply command-line overrides.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load_or_default(&self.config)?;
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(ref record) = self.record {
            config.record_path = record.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Block an IP address
    Add {
        /// IPv4 address to block
        ip: String,
    },

    /// Unblock an IP address
    Remove {
        /// IPv4 address to unblock
        ip: String,
    },

    /// List all blocked IPs
    List,

    /// Clear all blocked IPs
    Clear,

    /// Show blocklist and packet statistics
    Stats {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Check if an IP is blocked
    Check {
        /// IPv4 address to check
        ip: String,
    },

    /// Show version
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add() {
        let cli = Cli::try_parse_from(["xdpguard", "add", "10.0.0.5"]).unwrap();
        assert!(matches!(cli.command, Commands::Add { ref ip } if ip == "10.0.0.5"));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "xdpguard",
            "list",
            "--backend",
            "simulated",
            "--record",
            "/tmp/x.txt",
            "-v",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::List));
        assert_eq!(cli.backend, Some(BackendKind::Simulated));
        assert_eq!(cli.record, Some(PathBuf::from("/tmp/x.txt")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_parse_stats_json() {
        let cli = Cli::try_parse_from(["xdpguard", "stats", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Stats { json: true }));
    }

    #[test]
    fn test_parse_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["xdpguard", "list", "--backend", "ebpf"]).is_err());
    }

    #[test]
    fn test_add_requires_ip() {
        assert!(Cli::try_parse_from(["xdpguard", "add"]).is_err());
    }

    #[test]
    fn test_load_config_applies_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "backend: live\ntable_name: blocklist\n").unwrap();

        let cli = Cli::try_parse_from([
            "xdpguard",
            "list",
            "--config",
            config_path.to_str().unwrap(),
            "--backend",
            "simulated",
            "--record",
            "/tmp/override.txt",
        ])
        .unwrap();

        let config = cli.load_config().unwrap();
        assert_eq!(config.backend, BackendKind::Simulated);
        assert_eq!(config.table_name, "blocklist");
        assert_eq!(config.record_path, PathBuf::from("/tmp/override.txt"));
    }
}
