//! xdpguard - dynamic IP blocklist manager for XDP filters.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use xdpguard::cli::{Cli, Commands};
use xdpguard::manager::BlocklistManager;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::Version = cli.command {
        println!("xdpguard {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = cli.load_config()?;
    let manager = BlocklistManager::new(&config);

    match cli.command {
        Commands::Add { ref ip } => xdpguard::commands::add::run(ip, &manager),
        Commands::Remove { ref ip } => xdpguard::commands::remove::run(ip, &manager),
        Commands::List => xdpguard::commands::list::run(&manager),
        Commands::Clear => xdpguard::commands::clear::run(&manager),
        Commands::Stats { json } => xdpguard::commands::stats::run(json, &manager),
        Commands::Check { ref ip } => xdpguard::commands::check::run(ip, &manager),
        Commands::Version => Ok(()),
    }
}
