//! Parsers for `bpftool` text output.
//!
//! Kept free of any process handling so the grammar can be tested on
//! captured output alone.
//!
//! `bpftool map list` prints one record per map: a header line starting
//! with `<id>:` and optional indented continuation lines:
//!
//! ```text
//! 12: hash  name blocked_ips  flags 0x0
//!         key 4B  value 1B  max_entries 1024  memlock 4096B
//! ```
//!
//! `bpftool map dump` prints zero or more `key:`/`value:` marker pairs per
//! line followed by a trailer:
//!
//! ```text
//! key: c0 a8 01 64  value: 01
//! Found 1 element
//! ```

use thiserror::Error;

const KEY_MARKER: &str = "key:";
const VALUE_MARKER: &str = "value:";

/// One map as described by `bpftool map list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapInfo {
    /// Identifier token preceding the first colon of the header line.
    pub id: String,
    /// Storage kind (`hash`, `array`, `lru_hash`, ...).
    pub kind: String,
    pub name: Option<String>,
    /// Key width in bytes.
    pub key_size: Option<u32>,
}

impl MapInfo {
    pub fn is_hash(&self) -> bool {
        self.kind.contains("hash")
    }
}

/// Parse the full `bpftool map list` output.
pub fn parse_map_list(output: &str) -> Vec<MapInfo> {
    let mut records: Vec<String> = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let starts_record = !line.starts_with(char::is_whitespace) && header_id(line).is_some();
        if starts_record {
            records.push(line.trim().to_string());
        } else if let Some(record) = records.last_mut() {
            record.push(' ');
            record.push_str(line.trim());
        }
        // Anything else is noise before the first header.
    }

    records.iter().filter_map(|r| parse_map_record(r)).collect()
}

fn header_id(line: &str) -> Option<&str> {
    let (id, _) = line.split_once(':')?;
    let id = id.trim();
    (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then_some(id)
}

fn parse_map_record(record: &str) -> Option<MapInfo> {
    let id = header_id(record)?.to_string();
    let (_, rest) = record.split_once(':')?;
    let tokens: Vec<&str> = rest.split_whitespace().collect();

    let kind = tokens.first()?.to_string();
    let name = token_after(&tokens, "name").map(str::to_string);
    let key_size = token_after(&tokens, "key").and_then(parse_byte_size);

    Some(MapInfo {
        id,
        kind,
        name,
        key_size,
    })
}

fn token_after<'a>(tokens: &[&'a str], keyword: &str) -> Option<&'a str> {
    tokens
        .windows(2)
        .find(|w| w[0] == keyword)
        .map(|w| w[1])
}

/// Parse `4B` or `4` into a byte count.
fn parse_byte_size(token: &str) -> Option<u32> {
    token.strip_suffix('B').unwrap_or(token).parse().ok()
}

/// One key/value pair from a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// A dump line carrying a key marker that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not parse dump line '{line}': {reason}")]
pub struct ParseWarning {
    pub line: String,
    pub reason: String,
}

impl ParseWarning {
    pub fn new(line: &str, reason: impl Into<String>) -> Self {
        Self {
            line: line.trim().to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse a single dump line.
///
/// Lines without a `key:` marker (blank lines, `Found N elements`) yield an
/// empty vector.
pub fn parse_dump_line(line: &str) -> Result<Vec<DumpRecord>, ParseWarning> {
    let mut records = Vec::new();
    let mut segments = line.split(KEY_MARKER);
    // Anything before the first key marker is not part of an entry.
    segments.next();

    for segment in segments {
        let (key_text, value_text) = segment.split_once(VALUE_MARKER).unwrap_or((segment, ""));
        let key = parse_hex_bytes(key_text).map_err(|reason| ParseWarning::new(line, reason))?;
        if key.is_empty() {
            return Err(ParseWarning::new(line, "empty key"));
        }
        let value = parse_hex_bytes(value_text).map_err(|reason| ParseWarning::new(line, reason))?;
        records.push(DumpRecord { key, value });
    }

    Ok(records)
}

/// Decode whitespace-separated hex (`c0 a8 01 64`, `0xc0 0xa8`, or `c0a80164`).
fn parse_hex_bytes(text: &str) -> Result<Vec<u8>, String> {
    let digits: String = text
        .split_whitespace()
        .map(|tok| tok.strip_prefix("0x").unwrap_or(tok))
        .collect();

    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{}'", text.trim()));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("invalid hex in '{}'", text.trim()))
        })
        .collect()
}

/// Packet counters maintained by the data plane in its `pkt_count` array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketCounters {
    pub allowed: u64,
    pub blocked: u64,
}

const COUNTER_ALLOWED: u32 = 0;
const COUNTER_BLOCKED: u32 = 1;

/// Parse a dump of the counter array (u32 index keys, u64 values, host order).
pub fn parse_counters(output: &str) -> PacketCounters {
    let mut counters = PacketCounters::default();

    for line in output.lines() {
        let Ok(records) = parse_dump_line(line) else {
            continue;
        };
        for record in records {
            let (Some(index), Some(value)) = (ne_u32(&record.key), ne_u64(&record.value)) else {
                continue;
            };
            match index {
                COUNTER_ALLOWED => counters.allowed = value,
                COUNTER_BLOCKED => counters.blocked = value,
                _ => {}
            }
        }
    }

    counters
}

fn ne_u32(bytes: &[u8]) -> Option<u32> {
    bytes.try_into().ok().map(u32::from_ne_bytes)
}

fn ne_u64(bytes: &[u8]) -> Option<u64> {
    bytes.try_into().ok().map(u64::from_ne_bytes)
}
