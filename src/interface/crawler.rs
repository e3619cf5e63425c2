use crate::{CrawlAborted, CrawlSummary, SearchRepositoriesRequest};

/// A trait for crawling GitHub repositories page after page.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RepositoryCrawler: Sync + Send {
    /// Crawls the result stream of `request` until it is exhausted or `total_repositories` are persisted.
    async fn crawl(
        &self,
        request: SearchRepositoriesRequest,
        total_repositories: u32,
    ) -> Result<CrawlSummary, CrawlAborted>;
}
