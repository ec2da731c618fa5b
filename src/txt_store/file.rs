//! A JSON file-backed implementation of the [`TxtStore`][super::TxtStore] trait.
//!
//! Wraps an [`InMemoryTxtStore`][super::memory::InMemoryTxtStore] instance,
//! persisting updates to a JSON file on disk that can be reloaded across
//! restarts.
use crate::error::Error;
use crate::txt_store::memory::InMemoryTxtStore;
use crate::txt_store::{TxtRecord, TxtStore};
use std::io::ErrorKind;
use tokio::fs::File;
use tokio::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// A file-backed implementation of a challenge record store. After each
/// update a JSON file on disk is updated with the new data. This file is
/// reloaded across restarts to avoid losing in-flight challenges.
///
/// Wraps an [`InMemoryTxtStore`][super::memory::InMemoryTxtStore],
/// operating the same way except for maintaining state beyond memory.
#[derive(Default, Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct FileTxtStore {
    txt_store: InMemoryTxtStore,
    path: String,
}

impl FileTxtStore {
    /// Save the state of the store as JSON to the configured path, or
    /// return an Error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJson`] if a record in the store can't be
    /// serialized to JSON.
    ///
    /// Returns [`Error::Io`] if the serialized state can't be written to
    /// the backing file path.
    pub async fn save(&self) -> Result<(), Error> {
        let data = serde_json::to_string_pretty(&self.txt_store)?;
        let mut output_file = File::create(&self.path).await?;
        output_file.write_all(data.as_bytes()).await?;
        output_file.flush().await?;
        Ok(())
    }

    /// Load a [`FileTxtStore`] from the JSON state located at the given
    /// path, or return an Error. A missing file is created with empty
    /// state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJson`] if the JSON state file is invalid.
    ///
    /// Returns [`Error::Io`] if the path can't be opened or read.
    pub async fn try_from_file(p: &str) -> Result<Self, Error> {
        let contents = match File::open(p).await {
            Ok(mut f) => {
                let mut buf = vec![];
                f.read_to_end(&mut buf).await?;
                buf
            }
            Err(err) => match err.kind() {
                ErrorKind::NotFound => Self::write_empty_state(File::create(&p).await?).await?,
                _ => return Err(Error::Io(err)),
            },
        };

        let txt_store: InMemoryTxtStore = serde_json::from_slice(&contents)?;
        Ok(Self {
            path: p.to_string(),
            txt_store,
        })
    }

    async fn write_empty_state(mut f: File) -> io::Result<Vec<u8>> {
        let default_data = serde_json::to_string_pretty(&InMemoryTxtStore::default())?;
        let default_bytes = default_data.as_bytes();
        f.write_all(default_bytes).await?;
        f.flush().await?;
        Ok(default_bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl TxtStore for FileTxtStore {
    async fn add_txt(&mut self, zone: String, record: TxtRecord) -> Result<(), Error> {
        self.txt_store.add_txt(zone, record).await?;
        self.save().await?;
        Ok(())
    }

    async fn get_records(&self, zone: &str) -> Result<Vec<TxtRecord>, Error> {
        self.txt_store.get_records(zone).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persists_and_reloads_state() {
        let path = std::env::temp_dir().join(format!(
            "dnsnare-txt-store-{}.json",
            std::process::id()
        ));
        let path = path.to_str().unwrap().to_string();

        let mut store = FileTxtStore::try_from_file(&path).await.unwrap();
        store
            .add_txt(
                "_acme-challenge.oob.example.".to_string(),
                TxtRecord {
                    value: "token123".to_string(),
                    ttl: 30,
                },
            )
            .await
            .unwrap();
        drop(store);

        let reloaded = FileTxtStore::try_from_file(&path).await.unwrap();
        let records = reloaded
            .get_records("_acme-challenge.oob.example.")
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "token123");
        assert_eq!(records[0].ttl, 30);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
