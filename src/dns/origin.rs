//! Origin IP recovery behind trusted resolvers.
//!
//! Large DNS deployments often front clients with a recursive resolver, so
//! the transport peer the server sees is the resolver, not the probed
//! target. A trusted resolver can smuggle the true client address through
//! an EDNS0 LOCAL option; untrusted peers can't spoof it because the
//! allowlist gates acceptance.

use crate::config::Config;
use ipnetwork::IpNetwork;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use tracing::{error, warn};

pub(crate) struct OriginResolver {
    edns_opt: Option<u16>,
    trusted: Vec<IpNetwork>,
}

impl OriginResolver {
    /// Parse the trusted-source list. Entries are single IPs or CIDR
    /// blocks; malformed entries are logged and skipped.
    pub(crate) fn from_config(config: &Config) -> Self {
        let mut trusted = Vec::with_capacity(config.real_ip_from.len());
        for entry in &config.real_ip_from {
            if entry.contains('/') {
                match IpNetwork::from_str(entry) {
                    Ok(network) => trusted.push(network),
                    Err(err) => error!("invalid CIDR format: {entry}, err: {err}"),
                }
            } else {
                match IpAddr::from_str(entry) {
                    Ok(ip) => trusted.push(IpNetwork::from(ip)),
                    Err(_) => error!("invalid IP address: {entry}"),
                }
            }
        }
        OriginResolver {
            edns_opt: config.origin_ip_edns_opt,
            trusted,
        }
    }

    /// The "true" client address for a request: the transport peer, unless
    /// that peer is a trusted source carrying a well-formed origin-IP
    /// EDNS0 option.
    pub(crate) fn resolve(&self, peer: SocketAddr, edns: Option<&trust_dns_proto::op::Edns>) -> IpAddr {
        let host = peer.ip();
        let Some(code) = self.edns_opt else {
            return host;
        };
        if !self.trusted.iter().any(|network| network.contains(host)) {
            return host;
        }
        let Some(edns) = edns else {
            return host;
        };

        use trust_dns_proto::rr::rdata::opt::{EdnsCode, EdnsOption};
        match edns.options().get(EdnsCode::from(code)) {
            Some(EdnsOption::Unknown(_, data)) => match ip_from_bytes(data) {
                Some(ip) => ip,
                None => {
                    warn!("invalid origin IP address in EDNS0 option {code}");
                    host
                }
            },
            _ => host,
        }
    }
}

/// Interpret raw option data as an address: 4 bytes for IPv4, 16 for IPv6.
fn ip_from_bytes(data: &[u8]) -> Option<IpAddr> {
    match data.len() {
        4 => <[u8; 4]>::try_from(data).ok().map(|octets| IpAddr::V4(Ipv4Addr::from(octets))),
        16 => <[u8; 16]>::try_from(data)
            .ok()
            .map(|octets| IpAddr::V6(Ipv6Addr::from(octets))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use trust_dns_proto::op::Edns;
    use trust_dns_proto::rr::rdata::opt::EdnsOption;

    const OPT_CODE: u16 = 65001;

    fn resolver(edns_opt: Option<u16>, real_ip_from: &[&str]) -> OriginResolver {
        let mut config = test_config();
        config.origin_ip_edns_opt = edns_opt;
        config.real_ip_from = real_ip_from.iter().map(|s| (*s).to_string()).collect();
        OriginResolver::from_config(&config)
    }

    fn edns_with_origin(code: u16, data: Vec<u8>) -> Edns {
        let mut edns = Edns::new();
        edns.options_mut().insert(EdnsOption::Unknown(code, data));
        edns
    }

    fn peer() -> SocketAddr {
        "10.0.0.53:44317".parse().unwrap()
    }

    #[test]
    fn disabled_feature_returns_transport_peer() {
        let resolver = resolver(None, &["10.0.0.0/8"]);
        let edns = edns_with_origin(OPT_CODE, vec![198, 51, 100, 7]);
        assert_eq!(resolver.resolve(peer(), Some(&edns)), peer().ip());
    }

    #[test]
    fn untrusted_peer_cannot_override() {
        let resolver = resolver(Some(OPT_CODE), &["192.0.2.0/24"]);
        let edns = edns_with_origin(OPT_CODE, vec![198, 51, 100, 7]);
        assert_eq!(resolver.resolve(peer(), Some(&edns)), peer().ip());
    }

    #[test]
    fn trusted_cidr_peer_overrides_from_option() {
        let resolver = resolver(Some(OPT_CODE), &["10.0.0.0/8"]);
        let edns = edns_with_origin(OPT_CODE, vec![198, 51, 100, 7]);
        assert_eq!(
            resolver.resolve(peer(), Some(&edns)),
            IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7))
        );
    }

    #[test]
    fn trusted_single_ip_peer_overrides_v6() {
        let resolver = resolver(Some(OPT_CODE), &["10.0.0.53"]);
        let mut v6 = vec![0u8; 16];
        v6[0] = 0xfd;
        v6[15] = 1;
        let edns = edns_with_origin(OPT_CODE, v6);
        assert_eq!(
            resolver.resolve(peer(), Some(&edns)),
            "fd00::1".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn wrong_option_code_falls_back() {
        let resolver = resolver(Some(OPT_CODE), &["10.0.0.0/8"]);
        let edns = edns_with_origin(OPT_CODE + 1, vec![198, 51, 100, 7]);
        assert_eq!(resolver.resolve(peer(), Some(&edns)), peer().ip());
    }

    #[test]
    fn malformed_option_data_falls_back() {
        let resolver = resolver(Some(OPT_CODE), &["10.0.0.0/8"]);
        let edns = edns_with_origin(OPT_CODE, vec![1, 2, 3]);
        assert_eq!(resolver.resolve(peer(), Some(&edns)), peer().ip());
    }

    #[test]
    fn missing_edns_falls_back() {
        let resolver = resolver(Some(OPT_CODE), &["10.0.0.0/8"]);
        assert_eq!(resolver.resolve(peer(), None), peer().ip());
    }

    #[test]
    fn malformed_allowlist_entries_are_skipped() {
        let resolver = resolver(Some(OPT_CODE), &["not-an-ip", "10.0.0.0/8"]);
        let edns = edns_with_origin(OPT_CODE, vec![198, 51, 100, 7]);
        assert_eq!(
            resolver.resolve(peer(), Some(&edns)),
            IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7))
        );
    }
}
