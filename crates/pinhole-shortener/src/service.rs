use async_trait::async_trait;
use pinhole_core::{BatchKey, BatchRequest, Repository, ShortCode, Shortener, ShortenerError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Repository` and handles:
/// - URL validation before anything reaches storage
/// - Mapping storage errors to `ShortenerError`
///
/// Short codes are derived from the URL by the repository, so shortening
/// the same URL twice returns the same code.
#[derive(Debug)]
pub struct ShortenerService<R> {
    repository: Arc<R>,
}

impl<R> Clone for ShortenerService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: Repository> ShortenerService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// Validates that the URL has a valid format (has a scheme and host).
    fn validate_url(url: &str) -> Result<(), ShortenerError> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl("URL cannot be empty".to_string()));
        }

        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {}",
                url
            )));
        };
        if scheme.is_empty() || rest.is_empty() {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {}",
                url
            )));
        }

        let scheme = scheme.to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {}",
                scheme
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl<R: Repository> Shortener for ShortenerService<R> {
    async fn shorten(&self, original_url: &str) -> Result<ShortCode, ShortenerError> {
        Self::validate_url(original_url)?;

        let code = self.repository.add(original_url).await?;
        info!(code = %code, url = %original_url, "shortened url");
        Ok(code)
    }

    async fn shorten_batch(
        &self,
        requests: &[BatchRequest],
    ) -> Result<Vec<BatchKey>, ShortenerError> {
        for request in requests {
            Self::validate_url(&request.original_url)?;
        }

        let keys = self.repository.add_batch(requests).await?;
        info!(entries = keys.len(), "shortened url batch");
        Ok(keys)
    }

    async fn resolve(&self, code: &ShortCode) -> Result<String, ShortenerError> {
        let url = self.repository.get(code).await?;
        debug!(code = %code, url = %url, "resolved short code");
        Ok(url)
    }

    async fn ping(&self, timeout: Duration) -> Result<(), ShortenerError> {
        Ok(self.repository.ping(timeout).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinhole_storage::{FileRepository, InMemoryRepository};

    fn test_service() -> ShortenerService<InMemoryRepository> {
        ShortenerService::new(InMemoryRepository::new())
    }

    fn request(id: &str, url: &str) -> BatchRequest {
        BatchRequest {
            correlation_id: id.to_string(),
            original_url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn shorten_returns_derived_code() {
        let service = test_service();

        let code = service.shorten("https://example.com").await.unwrap();
        assert_eq!(code.as_str().len(), 10);
        assert_eq!(service.shorten("https://example.com").await.unwrap(), code);
    }

    #[tokio::test]
    async fn shorten_with_invalid_url_fails() {
        let service = test_service();

        let invalid = [
            "",
            "not-a-valid-url",
            "://example.com",
            "https://",
            "ftp://example.com",
        ];
        for url in invalid {
            let err = service.shorten(url).await.unwrap_err();
            assert!(matches!(err, ShortenerError::InvalidUrl(_)), "{url}");
        }
    }

    #[tokio::test]
    async fn resolve_existing_url() {
        let service = test_service();

        let code = service.shorten("https://example.com").await.unwrap();
        assert_eq!(service.resolve(&code).await.unwrap(), "https://example.com");
    }

    #[tokio::test]
    async fn resolve_nonexistent_url() {
        let service = test_service();

        let err = service
            .resolve(&ShortCode::parse("deadbeef00").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err, ShortenerError::NotFound("deadbeef00".into()));
    }

    #[tokio::test]
    async fn shorten_batch_rejects_any_invalid_url_before_storing() {
        let service = test_service();

        let err = service
            .shorten_batch(&[request("c1", "https://a.com"), request("c2", "nope")])
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidUrl(_)));

        let code = pinhole_core::KeyDeriver::derive("https://a.com");
        assert!(matches!(
            service.resolve(&code).await,
            Err(ShortenerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn shorten_batch_keeps_correlation_ids() {
        let service = test_service();

        let keys = service
            .shorten_batch(&[
                request("c1", "https://a.com"),
                request("c2", "https://b.com"),
            ])
            .await
            .unwrap();
        let ids: Vec<_> = keys.iter().map(|k| k.correlation_id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2"]);
    }

    #[tokio::test]
    async fn storage_failures_surface_as_storage_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = FileRepository::open(dir.path().join("links.log")).unwrap();
        repo.close().await.unwrap();
        let service = ShortenerService::new(repo);

        let err = service.shorten("https://example.com").await.unwrap_err();
        assert!(matches!(err, ShortenerError::Storage(_)));
    }
}
