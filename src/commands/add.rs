//! Add command implementation.

use anyhow::{Context, Result};

use crate::backend::Change;
use crate::manager::BlocklistManager;

/// Run the add command
pub fn run(ip: &str, manager: &BlocklistManager) -> Result<()> {
    println!("Adding IP {} to blocked list...", ip);

    let change = manager
        .add(ip)
        .with_context(|| format!("Error blocking IP {}", ip))?;

    match change {
        Change::Applied => println!("[OK] Successfully blocked IP: {}", ip),
        Change::Unchanged => println!("IP {} is already blocked", ip),
    }
    Ok(())
}
