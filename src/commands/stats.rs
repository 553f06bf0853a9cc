//! Stats command implementation.

use anyhow::Result;

use crate::backend::BlocklistStats;
use crate::manager::BlocklistManager;
use crate::utils::format_count_with_separator;

/// Run the stats command
pub fn run(json: bool, manager: &BlocklistManager) -> Result<()> {
    let stats = manager.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", render(&stats));
    }
    Ok(())
}

fn render(stats: &BlocklistStats) -> String {
    let mut out = String::new();
    let heading = match stats.traffic {
        Some(t) if t.illustrative => "Packet statistics (demo):",
        _ => "Packet statistics:",
    };

    out.push_str(heading);
    out.push('\n');
    out.push_str(&format!("  Backend: {}\n", stats.backend));
    out.push_str(&format!(
        "  Blocked IP rules: {}\n",
        format_count_with_separator(stats.blocked_rules as u64)
    ));

    match stats.traffic {
        Some(t) => {
            out.push_str(&format!(
                "  Allowed packets: {}\n",
                format_count_with_separator(t.allowed)
            ));
            out.push_str(&format!(
                "  Blocked packets: {}\n",
                format_count_with_separator(t.blocked)
            ));
            out.push_str(&format!(
                "  Total packets processed: {}\n",
                format_count_with_separator(t.total)
            ));
        }
        None => out.push_str("  Packet counters: unavailable\n"),
    }

    out
}
