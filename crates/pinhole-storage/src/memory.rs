use crate::index::KeyIndex;
use async_trait::async_trait;
use pinhole_core::error::Result;
use pinhole_core::{BatchKey, BatchRequest, KeyDeriver, Repository, ShortCode, StorageError};
use std::time::Duration;
use tracing::trace;

/// In-memory implementation of the [`Repository`] trait.
///
/// Mappings live only as long as the process. Writers take the index
/// exclusively, readers share it.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    index: KeyIndex,
}

impl InMemoryRepository {
    /// Creates an empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_index(index: KeyIndex) -> Self {
        Self { index }
    }

    pub(crate) fn index(&self) -> &KeyIndex {
        &self.index
    }

    /// Returns the number of stored mappings.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

pub(crate) fn derive_batch(requests: &[BatchRequest]) -> Vec<(ShortCode, &str)> {
    requests
        .iter()
        .map(|request| {
            (
                KeyDeriver::derive(&request.original_url),
                request.original_url.as_str(),
            )
        })
        .collect()
}

pub(crate) fn batch_keys(
    requests: &[BatchRequest],
    derived: Vec<(ShortCode, &str)>,
) -> Vec<BatchKey> {
    requests
        .iter()
        .zip(derived)
        .map(|(request, (code, _))| BatchKey {
            correlation_id: request.correlation_id.clone(),
            code,
        })
        .collect()
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn add(&self, url: &str) -> Result<ShortCode> {
        let code = KeyDeriver::derive(url);
        let outcome = self.index.try_insert(code.clone(), url)?;
        trace!(code = %code, ?outcome, "stored url in memory");
        Ok(code)
    }

    async fn get(&self, code: &ShortCode) -> Result<String> {
        self.index
            .get(code)
            .ok_or_else(|| StorageError::NotFound(code.to_string()))
    }

    async fn add_batch(&self, requests: &[BatchRequest]) -> Result<Vec<BatchKey>> {
        let derived = derive_batch(requests);
        self.index.try_insert_batch(&derived)?;
        Ok(batch_keys(requests, derived))
    }

    async fn ping(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
