use crate::error::Result;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One entry of a batch shorten request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Caller-chosen identifier echoed back in the matching [`BatchKey`].
    pub correlation_id: String,
    /// The URL to shorten.
    pub original_url: String,
}

/// The short code stored for one [`BatchRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchKey {
    pub correlation_id: String,
    pub code: ShortCode,
}

/// The storage contract shared by every backend.
///
/// Keys are derived from URLs, so `add` is idempotent for the same URL.
/// A URL whose derived code is already taken by a *different* URL is
/// rejected with `StorageError::Conflict`.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Stores `url` under its derived short code and returns the code.
    ///
    /// Durable backends persist the record before returning.
    async fn add(&self, url: &str) -> Result<ShortCode>;

    /// Retrieves the URL stored under `code`.
    /// Returns `Err(NotFound)` if the code does not exist.
    async fn get(&self, code: &ShortCode) -> Result<String>;

    /// Stores every request and returns one [`BatchKey`] per request, in input order.
    ///
    /// Either every entry is stored or none is.
    async fn add_batch(&self, requests: &[BatchRequest]) -> Result<Vec<BatchKey>>;

    /// Checks that the backing medium is reachable without mutating it.
    async fn ping(&self, timeout: Duration) -> Result<()>;

    /// Releases file handles and connections.
    async fn close(&self) -> Result<()>;
}

#[async_trait]
impl<T: Repository + ?Sized> Repository for Arc<T> {
    async fn add(&self, url: &str) -> Result<ShortCode> {
        (**self).add(url).await
    }

    async fn get(&self, code: &ShortCode) -> Result<String> {
        (**self).get(code).await
    }

    async fn add_batch(&self, requests: &[BatchRequest]) -> Result<Vec<BatchKey>> {
        (**self).add_batch(requests).await
    }

    async fn ping(&self, timeout: Duration) -> Result<()> {
        (**self).ping(timeout).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}
