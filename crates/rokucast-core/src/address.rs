//! Local addresses and the /24 prefixes scanned from them

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;

/// Number of host addresses probed per prefix (`.1` through `.255`)
pub const HOSTS_PER_PREFIX: usize = 255;

const HOST_OCTETS: RangeInclusive<u8> = 1..=255;

/// An address believed to be assigned to a local interface of this host.
///
/// Identity is the exact address token as it appeared in the gathered
/// candidate, so `"192.168.1.42"` and an mDNS host name never compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalAddress(pub String);

impl LocalAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse as a dotted-quad IPv4 address, if it is one
    pub fn to_ipv4(&self) -> Option<Ipv4Addr> {
        self.0.parse().ok()
    }
}

impl std::fmt::Display for LocalAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Ipv4Addr> for LocalAddress {
    fn from(ip: Ipv4Addr) -> Self {
        Self(ip.to_string())
    }
}

/// The first three octets of an IPv4 address, identifying one /24 to scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubnetPrefix([u8; 3]);

impl SubnetPrefix {
    pub const fn new(a: u8, b: u8, c: u8) -> Self {
        Self([a, b, c])
    }

    /// Derive the prefix of a local address. Non-IPv4 tokens have no prefix.
    pub fn from_local_address(address: &LocalAddress) -> Option<Self> {
        address.to_ipv4().map(Self::from)
    }

    pub fn octets(&self) -> [u8; 3] {
        self.0
    }

    /// The address `prefix.host`; host octet 0 is never a probe target
    pub fn host(&self, octet: u8) -> Option<Ipv4Addr> {
        if !HOST_OCTETS.contains(&octet) {
            return None;
        }
        let [a, b, c] = self.0;
        Some(Ipv4Addr::new(a, b, c, octet))
    }

    /// Every probe target in this prefix, `.1` through `.255` in order
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        let [a, b, c] = self.0;
        HOST_OCTETS.map(move |h| Ipv4Addr::new(a, b, c, h))
    }

    /// Whether `ip` lies inside this prefix
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let [a, b, c, _] = ip.octets();
        self.0 == [a, b, c]
    }
}

impl From<Ipv4Addr> for SubnetPrefix {
    fn from(ip: Ipv4Addr) -> Self {
        let [a, b, c, _] = ip.octets();
        Self([a, b, c])
    }
}

impl std::fmt::Display for SubnetPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{}.{}.{}", a, b, c)
    }
}
