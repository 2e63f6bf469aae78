use crate::repository::{BatchKey, BatchRequest};
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use std::time::Duration;

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Creates a shortened URL and returns its short code.
    async fn shorten(&self, original_url: &str) -> Result<ShortCode>;

    /// Shortens every URL of a batch, preserving input order.
    async fn shorten_batch(&self, requests: &[BatchRequest]) -> Result<Vec<BatchKey>>;

    /// Resolves a short code to the original URL.
    async fn resolve(&self, code: &ShortCode) -> Result<String>;

    /// Checks that the underlying storage is reachable within `timeout`.
    async fn ping(&self, timeout: Duration) -> Result<()>;
}
