use crate::{FetchError, FetchOutcome, Response, SearchRepositoriesRequest};

/// A trait for issuing a single repository query to the API.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RepositoryFetcher: Sync + Send {
    /// Executes exactly one call and classifies its outcome.
    async fn fetch(&self, request: &SearchRepositoriesRequest) -> FetchOutcome;
}

/// A trait for fetching a page, recovering internally from retryable failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PageFetcher: Sync + Send {
    /// Fetches the page of `request`, or reports why it could not be fetched.
    async fn fetch_page(&self, request: &SearchRepositoriesRequest) -> Result<Response, FetchError>;
}
