//! An in-memory implementation of the [`InteractionStorage`] trait.
//!
//! Makes no effort to persist interactions between restarts and applies no
//! eviction; it is intended for tests and single-shot hunting sessions.
use crate::error::Error;
use crate::storage::InteractionStorage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Interactions grouped by key, newest last.
#[derive(Default, Debug, Clone)]
pub struct InMemoryStorage {
    interactions: Arc<RwLock<HashMap<String, Vec<Vec<u8>>>>>,
}

impl InMemoryStorage {
    /// Snapshot of the interactions stored under `key`.
    pub async fn interactions(&self, key: &str) -> Vec<Vec<u8>> {
        self.interactions
            .read()
            .await
            .get(key)
            .map_or(Vec::default(), Clone::clone)
    }
}

#[async_trait::async_trait]
impl InteractionStorage for InMemoryStorage {
    async fn add_interaction(&self, correlation_id: &str, data: Vec<u8>) -> Result<(), Error> {
        self.interactions
            .write()
            .await
            .entry(correlation_id.to_string())
            .or_default()
            .push(data);
        Ok(())
    }

    async fn add_interaction_with_id(&self, id: &str, data: Vec<u8>) -> Result<(), Error> {
        self.add_interaction(id, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_per_key() {
        let storage = InMemoryStorage::default();
        storage
            .add_interaction("c4ca4238a0b923820dcc", b"{\"a\":1}".to_vec())
            .await
            .unwrap();
        storage
            .add_interaction("c4ca4238a0b923820dcc", b"{\"a\":2}".to_vec())
            .await
            .unwrap();
        storage
            .add_interaction_with_id("oob.example", b"{}".to_vec())
            .await
            .unwrap();

        assert_eq!(storage.interactions("c4ca4238a0b923820dcc").await.len(), 2);
        assert_eq!(storage.interactions("oob.example").await.len(), 1);
        assert!(storage.interactions("missing").await.is_empty());
    }
}
