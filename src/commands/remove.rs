//! Remove command implementation.

use anyhow::{Context, Result};

use crate::backend::Change;
use crate::manager::BlocklistManager;

/// Run the remove command
pub fn run(ip: &str, manager: &BlocklistManager) -> Result<()> {
    println!("Removing IP {} from blocked list...", ip);

    let change = manager
        .remove(ip)
        .with_context(|| format!("Error unblocking IP {}", ip))?;

    match change {
        Change::Applied => println!("[OK] Successfully unblocked IP: {}", ip),
        Change::Unchanged => println!("IP {} is not in the blocked list", ip),
    }
    Ok(())
}
