//! Clear command implementation.

use anyhow::{Context, Result};

use crate::manager::BlocklistManager;
use crate::utils::pluralize;

/// Run the clear command
pub fn run(manager: &BlocklistManager) -> Result<()> {
    println!("Clearing all blocked IPs...");

    let removed = manager.clear().context("Error clearing blocked IPs")?;

    if removed == 0 {
        println!("No blocked IPs to clear");
    } else {
        println!("[OK] Cleared {}", pluralize(removed, "blocked IP", "blocked IPs"));
    }
    Ok(())
}
