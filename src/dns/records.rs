//! Custom DNS record overlays.
//!
//! The leftmost label of a query can override the default answer: either
//! as a whole (`aws.<apex>` serves the cloud metadata IP) or per subtoken,
//! where a label like `deadbeef-cafebabe` is split on `-`/`_` and each
//! token contributes a candidate address — a hex-encoded IPv4 literal, a
//! configured overlay, or (for empty tokens) the server default. One
//! candidate is chosen uniformly at random per query, which lets a single
//! hostname spray multiple origins for SSRF probing.

use crate::config::Config;
use crate::error::Error;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use tracing::warn;

/// Cloud metadata endpoints and loopback, always present.
const DEFAULT_RECORDS: [(&str, Ipv4Addr); 4] = [
    ("aws", Ipv4Addr::new(169, 254, 169, 254)),
    ("alibaba", Ipv4Addr::new(100, 100, 100, 200)),
    ("localhost", Ipv4Addr::new(127, 0, 0, 1)),
    ("oracle", Ipv4Addr::new(192, 0, 0, 192)),
];

const DEFAULT_V6_RECORDS: [(&str, Ipv6Addr); 1] = [("localhost", Ipv6Addr::LOCALHOST)];

/// Split a single label on `-` and `_`, preserving empty runs: `a--b`
/// yields `["a", "", "b"]`. Empty tokens are meaningful downstream — they
/// stand for the server's default address.
pub(crate) fn split_subdomain_parts(s: &str) -> Vec<&str> {
    s.split(['-', '_']).collect()
}

/// Decode an 8-digit lowercase hex token into an IPv4 address.
fn hex_ipv4(part: &str) -> Option<Ipv4Addr> {
    if part.len() != 8 || !part.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }
    let mut octets = [0u8; 4];
    for (i, octet) in octets.iter_mut().enumerate() {
        *octet = u8::from_str_radix(&part[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(Ipv4Addr::from(octets))
}

/// The optional YAML overlay document: `ipv4:`/`ipv6:` maps of label to
/// address literal.
#[derive(Deserialize, Debug, Default)]
struct RecordsFile {
    #[serde(default)]
    ipv4: HashMap<String, String>,
    #[serde(default)]
    ipv6: HashMap<String, String>,
}

/// Frozen-after-construction custom record tables. Keys are lowercased at
/// insertion; lookups fold the queried label. Reads need no locking.
#[derive(Debug, Clone)]
pub struct CustomRecords {
    records: HashMap<String, Ipv4Addr>,
    v6_records: HashMap<String, Ipv6Addr>,
    subdomain_records: HashMap<String, Ipv4Addr>,
    subdomain_v6_records: HashMap<String, Ipv6Addr>,
    ip_address: Ipv4Addr,
    ipv6_address: Ipv6Addr,
}

impl CustomRecords {
    /// Build the record tables from defaults, the inline `name=ip` list and
    /// the optional records file. Malformed entries are logged and skipped;
    /// an unreadable file is logged and ignored.
    pub fn from_config(config: &Config) -> Self {
        let mut server = CustomRecords {
            records: DEFAULT_RECORDS
                .iter()
                .map(|(k, v)| ((*k).to_string(), *v))
                .collect(),
            v6_records: DEFAULT_V6_RECORDS
                .iter()
                .map(|(k, v)| ((*k).to_string(), *v))
                .collect(),
            subdomain_records: HashMap::new(),
            subdomain_v6_records: HashMap::new(),
            ip_address: config.ip_address,
            ipv6_address: config.ipv6_address,
        };

        for entry in &config.dns_subdomain_records {
            if let Some((name, ip)) = entry.split_once('=') {
                match ip.parse::<IpAddr>() {
                    Ok(IpAddr::V4(addr)) => {
                        server.subdomain_records.insert(name.to_lowercase(), addr);
                    }
                    Ok(IpAddr::V6(addr)) => {
                        server.subdomain_v6_records.insert(name.to_lowercase(), addr);
                    }
                    Err(_) => {
                        warn!("invalid subdomain record \"{entry}\": invalid IP address");
                    }
                }
            }
        }

        if let Some(path) = &config.custom_records_path {
            if let Err(err) = server.read_records_from_file(path) {
                tracing::error!("could not read custom DNS records: {err}");
            }
        }
        server
    }

    fn read_records_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let contents = std::fs::read_to_string(path)?;
        let data: RecordsFile = serde_yaml::from_str(&contents)?;

        for (name, ip) in data.ipv4 {
            match ip.parse::<Ipv4Addr>() {
                Ok(addr) => {
                    self.records.insert(name.to_lowercase(), addr);
                }
                Err(_) => warn!("invalid custom record \"{name}: {ip}\": invalid IPv4 address"),
            }
        }
        for (name, ip) in data.ipv6 {
            match ip.parse::<Ipv6Addr>() {
                Ok(addr) => {
                    self.v6_records.insert(name.to_lowercase(), addr);
                }
                Err(_) => warn!("invalid custom record \"{name}: {ip}\": invalid IPv6 address"),
            }
        }
        Ok(())
    }

    /// Resolve an A override for a query name, or `None` to use the server
    /// default.
    pub fn lookup_a(&self, name: &str) -> Option<Ipv4Addr> {
        let (label, _) = name.split_once('.')?;
        if let Some(ip) = self.records.get(&label.to_lowercase()) {
            return Some(*ip);
        }

        let parts = split_subdomain_parts(label);
        if parts.len() == 1 {
            return None;
        }
        let mut candidates = Vec::new();
        for part in parts {
            if part.is_empty() {
                candidates.push(self.ip_address);
            } else if let Some(ip) = hex_ipv4(part) {
                candidates.push(ip);
            } else if let Some(ip) = self.subdomain_records.get(&part.to_lowercase()) {
                candidates.push(*ip);
            }
        }
        candidates.choose(&mut rand::thread_rng()).copied()
    }

    /// Resolve an AAAA override for a query name. Same shape as
    /// [`lookup_a`][Self::lookup_a] minus the hex literal rule, which only
    /// exists for IPv4.
    pub fn lookup_aaaa(&self, name: &str) -> Option<Ipv6Addr> {
        let (label, _) = name.split_once('.')?;
        if let Some(ip) = self.v6_records.get(&label.to_lowercase()) {
            return Some(*ip);
        }

        let parts = split_subdomain_parts(label);
        if parts.len() == 1 {
            return None;
        }
        let mut candidates = Vec::new();
        for part in parts {
            if part.is_empty() {
                candidates.push(self.ipv6_address);
            } else if let Some(ip) = self.subdomain_v6_records.get(&part.to_lowercase()) {
                candidates.push(*ip);
            }
        }
        candidates.choose(&mut rand::thread_rng()).copied()
    }
}
