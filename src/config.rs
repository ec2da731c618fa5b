use crate::error::Error;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::fs::File;
use std::io::BufReader;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_server::client::rr::Name;

pub type SharedConfig = Arc<Config>;

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Apex domains the server is authoritative for, most significant first.
    /// The first entry doubles as the fallback NS/MX zone for queries that
    /// match no configured apex.
    pub domains: Vec<String>,
    pub dns_udp_bind_addr: SocketAddr,
    pub dns_tcp_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub dns_tcp_timeout: Duration,
    #[serde(default = "default_dns_ttl")]
    pub dns_ttl: u32,
    /// Default answer for A queries when no custom record matches.
    pub ip_address: Ipv4Addr,
    /// Default answer for AAAA queries when no custom record matches.
    pub ipv6_address: Ipv6Addr,
    #[serde(default = "default_correlation_id_length")]
    pub correlation_id_length: usize,
    #[serde(default = "default_correlation_id_nonce_length")]
    pub correlation_id_nonce_length: usize,
    /// Record any interaction with a configured apex under the apex key,
    /// whether or not a correlation identifier was extracted.
    #[serde(default)]
    pub root_tld: bool,
    /// Hunt for correlation identifiers in the whole request dump instead of
    /// only the question name.
    #[serde(default)]
    pub scan_everywhere: bool,
    /// Optional YAML file with extra `ipv4:`/`ipv6:` custom record maps.
    #[serde(default)]
    pub custom_records_path: Option<PathBuf>,
    /// Inline `name=ip` overlays applied to individual subdomain tokens.
    #[serde(default)]
    pub dns_subdomain_records: Vec<String>,
    /// EDNS0 LOCAL option code carrying the true client IP behind a trusted
    /// resolver. Absent means the feature is disabled.
    #[serde(default)]
    pub origin_ip_edns_opt: Option<u16>,
    /// Sources trusted to supply the origin-IP option, as single IPs or
    /// CIDR blocks.
    #[serde(default)]
    pub real_ip_from: Vec<String>,
    /// When set, ACME challenge records persist to this JSON file across
    /// restarts; otherwise they live in memory only.
    #[serde(default)]
    pub txt_store_state_path: Option<String>,
}

const fn default_dns_ttl() -> u32 {
    3600
}

const fn default_correlation_id_length() -> usize {
    20
}

const fn default_correlation_id_nonce_length() -> usize {
    13
}

impl Config {
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        conf.validate()?;
        Ok(conf)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.domains.is_empty() {
            return Err(Error::NoDomains);
        }
        Ok(())
    }

    /// The configured apexes as fully qualified names, in config order.
    pub fn fqdn_domains(&self) -> Result<Vec<Name>, Error> {
        self.domains
            .iter()
            .map(|domain| {
                let mut name = Name::from_str(domain)?;
                name.set_fqdn(true);
                Ok(name)
            })
            .collect()
    }

    /// Total length of an identifier on the wire: the correlation prefix
    /// plus the per-probe nonce suffix.
    pub fn full_id_length(&self) -> usize {
        self.correlation_id_length + self.correlation_id_nonce_length
    }

    /// Whether a lowercased token is shaped like a correlation identifier.
    /// This is a locator test only; registration policy lives with the
    /// storage sink.
    pub fn is_correlation_id(&self, part: &str) -> bool {
        part.len() == self.full_id_length() && part.chars().all(|c| c.is_ascii_alphanumeric())
    }

    /// The storage-sink key for an extracted identifier: its correlation
    /// prefix, with the nonce suffix stripped.
    pub fn correlation_key<'a>(&self, unique_id: &'a str) -> &'a str {
        if unique_id.len() >= self.correlation_id_length {
            &unique_id[..self.correlation_id_length]
        } else {
            unique_id
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    serde_json::from_value(serde_json::json!({
        "domains": ["oob.example"],
        "dns_udp_bind_addr": "127.0.0.1:5353",
        "dns_tcp_bind_addr": "127.0.0.1:5353",
        "dns_tcp_timeout": 8,
        "dns_ttl": 60,
        "ip_address": "192.0.2.10",
        "ipv6_address": "2001:db8::1",
        "correlation_id_length": 20,
        "correlation_id_nonce_length": 0
    }))
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let conf: Config = serde_json::from_value(serde_json::json!({
            "domains": ["oob.example", "alt.example"],
            "dns_udp_bind_addr": "0.0.0.0:53",
            "dns_tcp_bind_addr": "0.0.0.0:53",
            "dns_tcp_timeout": 8,
            "ip_address": "198.51.100.4",
            "ipv6_address": "::1",
            "root_tld": true,
            "dns_subdomain_records": ["app=10.0.0.1"],
            "origin_ip_edns_opt": 65001,
            "real_ip_from": ["127.0.0.1", "10.0.0.0/8"]
        }))
        .unwrap();

        assert_eq!(conf.domains.len(), 2);
        assert_eq!(conf.dns_ttl, 3600);
        assert_eq!(conf.correlation_id_length, 20);
        assert_eq!(conf.correlation_id_nonce_length, 13);
        assert_eq!(conf.full_id_length(), 33);
        assert!(conf.root_tld);
        assert!(!conf.scan_everywhere);
        assert_eq!(conf.origin_ip_edns_opt, Some(65001));
        assert_eq!(conf.dns_tcp_timeout, Duration::from_secs(8));
    }

    #[test]
    fn rejects_empty_domains() {
        let conf: Config = serde_json::from_value(serde_json::json!({
            "domains": [],
            "dns_udp_bind_addr": "0.0.0.0:53",
            "dns_tcp_bind_addr": "0.0.0.0:53",
            "dns_tcp_timeout": 8,
            "ip_address": "198.51.100.4",
            "ipv6_address": "::1"
        }))
        .unwrap();
        assert!(matches!(conf.validate(), Err(Error::NoDomains)));
    }

    #[test]
    fn fqdn_domains_carry_trailing_dot() {
        let conf = test_config();
        let domains = conf.fqdn_domains().unwrap();
        assert_eq!(domains[0].to_string(), "oob.example.");
    }

    #[test]
    fn correlation_id_shape() {
        let conf = test_config();
        assert!(conf.is_correlation_id("c4ca4238a0b923820dcc"));
        assert!(!conf.is_correlation_id("c4ca4238a0b923820dc"));
        assert!(!conf.is_correlation_id("c4ca4238a0b923820dc-"));
        assert!(conf.is_correlation_id("C4CA4238A0B923820DCC"));
    }

    #[test]
    fn correlation_key_strips_nonce() {
        let mut conf = test_config();
        conf.correlation_id_nonce_length = 13;
        let id = "c4ca4238a0b923820dccaaaaaaaaaaaaa";
        assert_eq!(conf.correlation_key(id), "c4ca4238a0b923820dcc");
        assert_eq!(conf.correlation_key("short"), "short");
    }
}
