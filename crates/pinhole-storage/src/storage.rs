use crate::config::{BackendKind, StorageConfig};
use crate::database::{DatabaseOptions, DatabaseRepository};
use crate::file::FileRepository;
use crate::memory::InMemoryRepository;
use async_trait::async_trait;
use pinhole_core::error::Result;
use pinhole_core::{BatchKey, BatchRequest, Repository, ShortCode};
use std::time::Duration;
use tracing::info;

/// The storage facade: owns exactly one backend, chosen once at startup.
///
/// Every [`Repository`] call is forwarded unchanged to the selected backend.
/// There is no fallback between backends; a backend that fails to start
/// fails construction.
#[derive(Debug)]
pub enum Storage {
    InMemory(InMemoryRepository),
    File(FileRepository),
    Database(DatabaseRepository),
}

impl Storage {
    /// Builds the backend selected by [`StorageConfig::backend_kind`].
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let storage = match (config.backend_kind(), config.dsn(), config.file_path()) {
            (BackendKind::Database, Some(dsn), _) => {
                let options = DatabaseOptions::builder()
                    .max_connections(config.max_connections)
                    .query_timeout(config.query_timeout)
                    .build();
                Storage::Database(DatabaseRepository::connect_with(dsn, options).await?)
            }
            (BackendKind::File, _, Some(path)) => Storage::File(FileRepository::open(path)?),
            _ => Storage::InMemory(InMemoryRepository::new()),
        };

        info!(backend = %storage.kind(), "storage initialized");
        Ok(storage)
    }

    /// Returns which backend this facade owns.
    pub fn kind(&self) -> BackendKind {
        match self {
            Storage::InMemory(_) => BackendKind::InMemory,
            Storage::File(_) => BackendKind::File,
            Storage::Database(_) => BackendKind::Database,
        }
    }
}

#[async_trait]
impl Repository for Storage {
    async fn add(&self, url: &str) -> Result<ShortCode> {
        match self {
            Storage::InMemory(repo) => repo.add(url).await,
            Storage::File(repo) => repo.add(url).await,
            Storage::Database(repo) => repo.add(url).await,
        }
    }

    async fn get(&self, code: &ShortCode) -> Result<String> {
        match self {
            Storage::InMemory(repo) => repo.get(code).await,
            Storage::File(repo) => repo.get(code).await,
            Storage::Database(repo) => repo.get(code).await,
        }
    }

    async fn add_batch(&self, requests: &[BatchRequest]) -> Result<Vec<BatchKey>> {
        match self {
            Storage::InMemory(repo) => repo.add_batch(requests).await,
            Storage::File(repo) => repo.add_batch(requests).await,
            Storage::Database(repo) => repo.add_batch(requests).await,
        }
    }

    async fn ping(&self, timeout: Duration) -> Result<()> {
        match self {
            Storage::InMemory(repo) => repo.ping(timeout).await,
            Storage::File(repo) => repo.ping(timeout).await,
            Storage::Database(repo) => repo.ping(timeout).await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            Storage::InMemory(repo) => repo.close().await,
            Storage::File(repo) => repo.close().await,
            Storage::Database(repo) => repo.close().await,
        }
    }
}
