//! Address codec: dotted-quad text <-> 4-byte big-endian map keys.
//!
//! The XDP program looks up `ip->saddr` (network byte order) in the
//! blocklist map, so the key for `192.168.1.100` is the byte sequence
//! `c0 a8 01 64`.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::BlocklistError;

/// Width of a blocklist key in bytes.
pub const KEY_LEN: usize = 4;

/// A blocked IPv4 address whose text and key forms round-trip exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockedAddress(Ipv4Addr);

impl BlockedAddress {
    /// Parse canonical dotted-quad text.
    ///
    /// Input that `Ipv4Addr` accepts but that would not print back
    /// identically is rejected, so stored text never drifts from its key.
    pub fn parse(text: &str) -> Result<Self, BlocklistError> {
        let addr = Ipv4Addr::from_str(text)
            .map_err(|_| BlocklistError::InvalidAddress(text.to_string()))?;
        if addr.to_string() != text {
            return Err(BlocklistError::InvalidAddress(text.to_string()));
        }
        Ok(Self(addr))
    }

    /// Rebuild an address from a raw map key.
    pub fn from_key(key: &[u8]) -> Result<Self, BlocklistError> {
        let octets: [u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| BlocklistError::InvalidKey(key.len()))?;
        Ok(Self(Ipv4Addr::from(octets)))
    }

    pub fn key(&self) -> AddressKey {
        AddressKey(self.0.octets())
    }
}

impl fmt::Display for BlockedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for BlockedAddress {
    type Err = BlocklistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Big-endian 4-byte key as stored in the BPF hash map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressKey([u8; KEY_LEN]);

impl AddressKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Per-byte hex tokens in the form `bpftool ... key hex` expects.
    pub fn hex_bytes(&self) -> Vec<String> {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Renders as 8 lowercase hex digits, e.g. `c0a80164`.
impl fmt::Display for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Encode dotted-quad text into its map key.
pub fn encode(text: &str) -> Result<AddressKey, BlocklistError> {
    BlockedAddress::parse(text).map(|addr| addr.key())
}

/// Decode a map key back into dotted-quad text.
pub fn decode(key: &[u8]) -> Result<String, BlocklistError> {
    BlockedAddress::from_key(key).map(|addr| addr.to_string())
}
