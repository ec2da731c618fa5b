//! Authoritative DNS responder and interaction pipeline.
//!
//! # Answering
//!
//! The server is authoritative for each configured apex domain and
//! synthesizes every record it serves; there is no zone file. `A`, `AAAA`,
//! `CNAME` and `ANY` queries answer with the configured default address
//! unless a [custom record][records::CustomRecords] overrides it, and
//! carry the matching apex's `ns1`/`ns2` NS set in the authority section
//! with v4 glue. `MX` answers `mail.<apex>`, `NS` answers both
//! nameservers, `SOA` answers a synthetic record and `TXT` serves the
//! ACME challenge cell.
//!
//! E.g. with apex `oob.example` and default address `192.0.2.10`:
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 5353 aws.oob.example +short A
//! 169.254.169.254
//! ❯ dig @127.0.0.1 -p 5353 deadbeef-cafebabe.oob.example +short A
//! 222.173.190.239
//! ```
//!
//! Queries whose name starts with `_acme-challenge.` are answered by the
//! embedded DNS-01 provider from the pluggable
//! [`TxtStore`][crate::txt_store::TxtStore] instead, using each record's
//! own TTL.
//!
//! # Interactions
//!
//! Every non-challenge message is inspected for a correlation identifier
//! — in strict mode by walking the query labels, in scan-everywhere mode
//! by sliding a window over the whole request dump. A hit produces an
//! [`Interaction`][crate::interaction::Interaction] delivered to the
//! storage sink under the identifier's correlation prefix. In root-TLD
//! mode any query under a configured apex is additionally stored under
//! the apex key and fires the live result callback.

mod correlation;
pub mod handlers;
mod origin;
pub mod records;
pub mod server;

pub use handlers::{Handler, TxtRecordCell, DNS_CHALLENGE_PREFIX};
pub use records::CustomRecords;
pub use server::new;
