//! Common formatting helpers for command output.

/// Format a number with thousands separators (commas).
///
/// # Examples
/// ```
/// use xdpguard::utils::format_count_with_separator;
/// assert_eq!(format_count_with_separator(1000), "1,000");
/// assert_eq!(format_count_with_separator(1234567), "1,234,567");
/// ```
pub fn format_count_with_separator(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Pluralize a noun based on a count.
///
/// # Examples
/// ```
/// use xdpguard::utils::pluralize;
/// assert_eq!(pluralize(1, "IP", "IPs"), "1 IP");
/// assert_eq!(pluralize(3, "IP", "IPs"), "3 IPs");
/// ```
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}
