//! Check command implementation.

use anyhow::{Context, Result};

use crate::manager::BlocklistManager;

/// Run the check command
pub fn run(ip: &str, manager: &BlocklistManager) -> Result<()> {
    let blocked = manager
        .contains(ip)
        .with_context(|| format!("Error checking IP {}", ip))?;

    println!();
    if blocked {
        println!("IP {} is BLOCKED", ip);
    } else {
        println!("IP {} is NOT blocked", ip);
    }
    println!();

    Ok(())
}
