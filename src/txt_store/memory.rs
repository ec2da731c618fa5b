//! An in-memory implementation of the [`TxtStore`][super::TxtStore] trait.
//!
//! Makes no effort to persist challenge records between restarts.
use crate::error::Error;
use crate::txt_store::{TxtRecord, TxtStore};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// An in-memory implementation of a challenge record store. Records are
/// kept in a [`HashMap`] keyed by lowercased zone. Up to two records are
/// maintained per zone using a [`VecDeque`] so new values push old ones
/// off the end.
///
/// Two records per zone is sufficient to solve DNS-01 challenges for a
/// base FQDN identifier as well as a wildcard identifier (e.g.
/// `foo.example.com` and `*.foo.example.com`).
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryTxtStore {
    txt_records: HashMap<String, VecDeque<TxtRecord>>,
}

#[async_trait::async_trait]
impl TxtStore for InMemoryTxtStore {
    async fn add_txt(&mut self, zone: String, record: TxtRecord) -> Result<(), Error> {
        if !zone.ends_with('.') {
            return Err(Error::NotFqdn(zone));
        }
        let e = self.txt_records.entry(zone.to_lowercase()).or_default();
        e.insert(0, record);
        e.truncate(2);
        Ok(())
    }

    async fn get_records(&self, zone: &str) -> Result<Vec<TxtRecord>, Error> {
        Ok(self
            .txt_records
            .get(&zone.to_lowercase())
            .map_or(Vec::default(), |records| {
                records.iter().cloned().collect()
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: &str, ttl: u32) -> TxtRecord {
        TxtRecord {
            value: value.to_string(),
            ttl,
        }
    }

    #[tokio::test]
    async fn folds_zone_case() {
        let mut store = InMemoryTxtStore::default();
        store
            .add_txt("_acme-challenge.OOB.Example.".to_string(), record("token123", 30))
            .await
            .unwrap();

        let records = store
            .get_records("_acme-challenge.oob.example.")
            .await
            .unwrap();
        assert_eq!(records, vec![record("token123", 30)]);
    }

    #[tokio::test]
    async fn keeps_two_newest_records() {
        let mut store = InMemoryTxtStore::default();
        let zone = "_acme-challenge.oob.example.".to_string();
        for (i, value) in ["one", "two", "three"].iter().enumerate() {
            store
                .add_txt(zone.clone(), record(value, i as u32))
                .await
                .unwrap();
        }

        let records = store.get_records(&zone).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value, "three");
        assert_eq!(records[1].value, "two");
    }

    #[tokio::test]
    async fn rejects_relative_zone() {
        let mut store = InMemoryTxtStore::default();
        let err = store
            .add_txt("_acme-challenge.oob.example".to_string(), record("x", 30))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFqdn(_)));
    }
}
