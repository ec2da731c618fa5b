//! Error types.

use trust_dns_server::proto::error::ProtoError;

/// Error enumerates the possible dnsnare error states.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when a [`Config`][crate::config::Config] is loaded with an
    /// empty `domains` list. The server is authoritative for its apex
    /// domains and can't do anything without at least one.
    #[error("no apex domains configured")]
    NoDomains,

    /// Returned when a [`TxtStore`][crate::txt_store::TxtStore] key is not
    /// fully qualified. ACME challenge zones always carry a trailing dot on
    /// the wire.
    #[error("TXT store key is not a fully qualified name: \"{0}\"")]
    NotFqdn(String),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    Io(#[from] std::io::Error),

    /// Returned when processing JSON (e.g.
    /// [loading a `Config`][crate::config::Config::try_from_file], or
    /// loading a [`FileTxtStore`][crate::txt_store::file::FileTxtStore])
    /// fails due to invalid content.
    #[error("invalid JSON")]
    InvalidJson(#[from] serde_json::Error),

    /// Returned when the custom DNS records file is not valid YAML.
    #[error("invalid custom records file")]
    InvalidYaml(#[from] serde_yaml::Error),

    /// Returned when the DNS server encounters a generic DNS protocol error.
    #[error("DNS error")]
    Dns(#[from] ProtoError),
}
