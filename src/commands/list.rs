//! List command implementation.

use anyhow::{Context, Result};

use crate::manager::BlocklistManager;
use crate::utils::pluralize;

/// Run the list command
pub fn run(manager: &BlocklistManager) -> Result<()> {
    let mut listing = manager.list().context("Error listing blocked IPs")?;

    println!("Currently blocked IPs ({} backend):", manager.backend_kind());
    println!("{}", "-".repeat(30));

    let mut count = 0;
    for (i, ip) in listing.by_ref().enumerate() {
        println!("  {}. {}", i + 1, ip);
        count += 1;
    }

    if count == 0 {
        println!("  No IPs currently blocked");
    }

    let unparsed = listing.unparsed();
    if unparsed > 0 {
        println!();
        println!(
            "  [WARN] {} could not be parsed (run with --verbose for details)",
            pluralize(unparsed, "entry", "entries")
        );
    }

    Ok(())
}
