use std::{collections::HashSet, sync::Arc};

use anyhow::anyhow;
use log::{error, info};

use crate::{
    CompletionReason, CrawlAborted, CrawlPhase, CrawlSummary, Cursor, PageFetcher,
    RepositoryCrawler, RepositoryPersister, SearchRepositoriesRequest,
};

/// A state for the sequential crawler
#[derive(Debug, Default)]
pub struct SequentialCrawlerState {
    /// Every cursor handed out by the API so far
    cursors_seen: HashSet<Cursor>,
    pub(super) summary: CrawlSummary,
}

impl SequentialCrawlerState {
    fn starting_from(cursor: Option<Cursor>) -> Self {
        Self {
            cursors_seen: cursor.iter().cloned().collect(),
            summary: CrawlSummary::starting_from(cursor),
        }
    }

    fn transition(&mut self, phase: CrawlPhase) {
        info!("Crawl phase: {:?} -> {phase:?}", self.summary.phase);
        self.summary.phase = phase;
    }

    /// Records a cursor, returning false if it was already handed out.
    fn push_cursor(&mut self, cursor: &Cursor) -> bool {
        self.cursors_seen.insert(cursor.clone())
    }

    fn complete(mut self, reason: CompletionReason) -> CrawlSummary {
        self.transition(CrawlPhase::Complete);
        self.summary.completion = Some(reason);
        info!("Crawl completed ({reason:?}): {}", self.summary);

        self.summary
    }

    fn abort(mut self, reason: anyhow::Error) -> CrawlAborted {
        self.transition(CrawlPhase::Aborted);
        error!(
            "Crawl aborted: {reason:#}. Resume from cursor {:?}. {}",
            self.summary.last_persisted_cursor.as_deref(),
            self.summary
        );

        CrawlAborted {
            reason,
            summary: self.summary,
        }
    }
}

/// A sequential crawler
pub struct SequentialCrawler {
    fetcher: Arc<dyn PageFetcher>,
    persister: Arc<dyn RepositoryPersister>,
}

impl SequentialCrawler {
    /// Creates a new `SequentialCrawler` instance with the given fetcher and persister.
    pub fn new(fetcher: Arc<dyn PageFetcher>, persister: Arc<dyn RepositoryPersister>) -> Self {
        Self { fetcher, persister }
    }
}

#[async_trait::async_trait]
impl RepositoryCrawler for SequentialCrawler {
    async fn crawl(
        &self,
        request: SearchRepositoriesRequest,
        total_repositories: u32,
    ) -> Result<CrawlSummary, CrawlAborted> {
        let mut state = SequentialCrawlerState::starting_from(request.after().cloned());
        let mut request = request;

        loop {
            state.transition(CrawlPhase::Fetching);
            info!("Processing request: {request}");
            let response = match self.fetcher.fetch_page(&request).await {
                Ok(response) => response,
                Err(e) => return Err(state.abort(e.into())),
            };
            state.summary.api_rate_limit = Some(response.rate_limit().to_owned());
            let page = response.page();
            if page.repositories().is_empty() {
                info!("No repositories found for request: {request}");
            }

            state.transition(CrawlPhase::Persisting);
            let persisted = match self.persister.persist(page).await {
                Ok(persisted) => persisted,
                Err(e) => return Err(state.abort(e)),
            };
            state
                .summary
                .record_persisted_page(page.repositories().len(), &persisted);
            info!("{}", state.summary);

            let Some(next_cursor) = persisted.next_cursor else {
                return Ok(state.complete(CompletionReason::Exhausted));
            };
            if !state.push_cursor(&next_cursor) {
                return Err(state.abort(anyhow!(
                    "The API handed out cursor {next_cursor} a second time"
                )));
            }
            if state.summary.total_persisted_repositories() >= total_repositories {
                return Ok(state.complete(CompletionReason::BudgetReached));
            }
            request = request.next_page(next_cursor);
        }
    }
}
