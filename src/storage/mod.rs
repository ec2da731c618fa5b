//! Interaction storage sink.
//!
//! The DNS core never inspects stored interactions; it serializes an
//! [`Interaction`][crate::interaction::Interaction] to JSON and hands the
//! bytes to an [`InteractionStorage`] keyed either by the correlation
//! prefix extracted from the query or, in root-TLD mode, by the apex
//! domain itself. Storage failures are logged by the caller and never
//! block the DNS response.

use crate::error::Error;
use std::sync::Arc;

pub mod memory;

#[allow(clippy::module_name_repetitions)]
pub use memory::InMemoryStorage;

/// A storage sink shared by every listener worker. Implementations take
/// `&self` and use interior mutability so no outer lock is held across the
/// write.
#[allow(clippy::module_name_repetitions)]
pub type DynStorage = Arc<dyn InteractionStorage + Send + Sync>;

/// An async trait describing the interaction sink.
///
/// `data` is always a UTF-8 JSON document. Both operations may fail;
/// callers log the failure and carry on.
#[async_trait::async_trait]
pub trait InteractionStorage {
    /// Append an interaction under an extracted correlation key.
    async fn add_interaction(&self, correlation_id: &str, data: Vec<u8>) -> Result<(), Error>;

    /// Append an interaction under a caller-chosen key, e.g. an apex
    /// domain in root-TLD mode.
    async fn add_interaction_with_id(&self, id: &str, data: Vec<u8>) -> Result<(), Error>;
}
