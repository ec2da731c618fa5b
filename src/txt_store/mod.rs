//! Dynamic ACME challenge record storage.
//!
//! The DNS-01 provider answers `TXT` queries under the
//! `_acme-challenge.` subtree from a pluggable record store that an
//! external ACME client writes while a challenge is active. Records carry
//! their own TTL, which overrides the server TTL in the response.
//!
//! Two implementations are provided, [`memory::InMemoryTxtStore`] and
//! [`file::FileTxtStore`]. The former is not durable across restarts. The
//! latter writes its state to disk on each update and loads it again on
//! startup.
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod file;
pub mod memory;

#[allow(clippy::module_name_repetitions)]
pub use file::FileTxtStore;
#[allow(clippy::module_name_repetitions)]
pub use memory::InMemoryTxtStore;

/// `DynTxtStore` is a type alias for a [`TxtStore`] shared between the DNS
/// handler (reader) and the ACME client (writer) through an [`Arc`] and a
/// [`RwLock`].
#[allow(clippy::module_name_repetitions)]
pub type DynTxtStore = Arc<RwLock<dyn TxtStore + Send + Sync>>;

/// A single DNS-01 challenge response value with its zone-local TTL.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxtRecord {
    pub value: String,
    pub ttl: u32,
}

/// An async trait describing storage of [RFC-8555][RFC-8555] [DNS-01]
/// challenge response records, keyed by the lowercased challenge zone
/// (e.g. `_acme-challenge.oob.example.`).
///
/// [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
/// [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
#[async_trait::async_trait]
pub trait TxtStore {
    /// Add a challenge record for the given zone. The zone is lowercased
    /// at insertion; at most the two newest records are kept per zone,
    /// enough for a base identifier plus its wildcard.
    async fn add_txt(&mut self, zone: String, record: TxtRecord) -> Result<(), Error>;

    /// The challenge records for the given zone (if any), newest first.
    async fn get_records(&self, zone: &str) -> Result<Vec<TxtRecord>, Error>;
}
