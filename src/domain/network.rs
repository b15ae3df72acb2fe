// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Value Objects with Validation Invariants
//!
//! [`Cidr`] is the only address type the topology compiler needs: every
//! network block, subnet block and rule source is a prefix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32 for IPv4, 0-128 for IPv6)")]
    InvalidPrefixLength(u8),
}

/// Address family of a [`Cidr`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    V4,
    V6,
}

/// Address block in CIDR notation
///
/// Invariants:
/// - Prefix length is always present
/// - Prefix length within range for the address family
///
/// The address is kept as written (host bits are not masked) so that the
/// rendered block matches the configuration text.
///
/// # Examples
///
/// ```rust
/// use cim_landing_zone::domain::Cidr;
///
/// let net = Cidr::new("10.2.0.0/16").unwrap();
/// let subnet = Cidr::new("10.2.88.0/27").unwrap();
/// assert!(net.contains(&subnet));
/// assert_eq!(subnet.to_string(), "10.2.88.0/27");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr {
    address: IpAddr,
    prefix_length: u8,
}

impl Cidr {
    /// Parse a block such as `10.0.0.0/8` or `2001:db8::/32`
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, NetworkError> {
        let cidr = cidr.as_ref().trim();
        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| NetworkError::InvalidCidr(cidr.to_string()))?;

        let address = IpAddr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidIpAddress(addr_str.to_string()))?;
        let prefix_length = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;

        Self::from_parts(address, prefix_length)
    }

    /// Create from separate address and prefix
    pub fn from_parts(address: IpAddr, prefix_length: u8) -> Result<Self, NetworkError> {
        if prefix_length > Self::max_prefix(&address) {
            return Err(NetworkError::InvalidPrefixLength(prefix_length));
        }
        Ok(Self {
            address,
            prefix_length,
        })
    }

    fn max_prefix(address: &IpAddr) -> u8 {
        match address {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }

    /// `0.0.0.0/0`
    pub fn any_ipv4() -> Self {
        Self {
            address: IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            prefix_length: 0,
        }
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    pub fn family(&self) -> AddressFamily {
        match self.address {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    pub fn is_ipv6(&self) -> bool {
        self.family() == AddressFamily::V6
    }

    /// Network address as a 128-bit integer, host bits cleared
    fn network_bits(&self) -> u128 {
        let (raw, width) = match self.address {
            IpAddr::V4(v4) => (u32::from(v4) as u128, 32u32),
            IpAddr::V6(v6) => (u128::from(v6), 128u32),
        };
        let host_bits = width - self.prefix_length as u32;
        if host_bits >= 128 {
            0
        } else {
            (raw >> host_bits) << host_bits
        }
    }

    /// True when `other` lies entirely inside this block
    ///
    /// Blocks of different families never contain one another.
    pub fn contains(&self, other: &Cidr) -> bool {
        if self.family() != other.family() || other.prefix_length < self.prefix_length {
            return false;
        }
        let width = match self.family() {
            AddressFamily::V4 => 32u32,
            AddressFamily::V6 => 128u32,
        };
        let shift = width - self.prefix_length as u32;
        if shift >= 128 {
            return true;
        }
        (self.network_bits() >> shift) == (other.network_bits() >> shift)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_length)
    }
}

impl FromStr for Cidr {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Cidr {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Cidr> for String {
    fn from(value: Cidr) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_cidr() {
        let cidr = Cidr::new("10.2.88.32/27").unwrap();
        assert_eq!(cidr.prefix_length(), 27);
        assert_eq!(cidr.family(), AddressFamily::V4);
        assert_eq!(cidr.to_string(), "10.2.88.32/27");
    }

    #[test]
    fn test_ipv6_cidr() {
        let cidr = Cidr::new("2001:db8::/32").unwrap();
        assert!(cidr.is_ipv6());
        assert_eq!(cidr.to_string(), "2001:db8::/32");
    }

    #[test]
    fn test_prefix_required() {
        assert!(matches!(
            Cidr::new("10.0.0.1"),
            Err(NetworkError::InvalidCidr(_))
        ));
    }

    #[test]
    fn test_prefix_out_of_range() {
        assert_eq!(
            Cidr::new("10.0.0.0/33"),
            Err(NetworkError::InvalidPrefixLength(33))
        );
        assert!(Cidr::new("::/128").is_ok());
    }

    #[test]
    fn test_contains() {
        let net = Cidr::new("10.2.0.0/16").unwrap();
        assert!(net.contains(&Cidr::new("10.2.88.64/27").unwrap()));
        assert!(!net.contains(&Cidr::new("10.3.0.0/24").unwrap()));
        assert!(!net.contains(&Cidr::new("10.0.0.0/8").unwrap()));
        assert!(Cidr::new("0.0.0.0/0").unwrap().contains(&net));
    }

    #[test]
    fn test_contains_mixed_family() {
        let v4 = Cidr::new("0.0.0.0/0").unwrap();
        let v6 = Cidr::new("2001:db8::/32").unwrap();
        assert!(!v4.contains(&v6));
        assert!(Cidr::new("::/0").unwrap().contains(&v6));
    }

    #[test]
    fn test_serde_as_string() {
        let cidr: Cidr = serde_json::from_str("\"100.96.250.0/23\"").unwrap();
        assert_eq!(serde_json::to_string(&cidr).unwrap(), "\"100.96.250.0/23\"");
    }
}
