use std::fmt::Display;

use super::{Cursor, FetcherRateLimit, PersistedPage};

/// The phases of a crawl; `Complete` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CrawlPhase {
    /// No query issued yet.
    #[default]
    Initial,
    /// A page query is in flight, retries included.
    Fetching,
    /// A fetched page is being written.
    Persisting,
    /// The result stream is exhausted or the budget is reached.
    Complete,
    /// A fatal error stopped the crawl.
    Aborted,
}

impl CrawlPhase {
    /// Returns true if no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Aborted)
    }
}

/// Why a crawl completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// The API reported no further page.
    Exhausted,
    /// The repositories budget was reached.
    BudgetReached,
}

/// The progress of a crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// The current phase.
    pub phase: CrawlPhase,

    /// Set once the crawl completed.
    pub completion: Option<CompletionReason>,

    /// The number of pages durably written.
    pub total_pages: u32,

    /// The number of repositories fetched.
    pub total_fetched_repositories: u32,

    /// The number of repositories inserted for the first time.
    pub total_inserted_repositories: u32,

    /// The number of repositories already stored and refreshed.
    pub total_updated_repositories: u32,

    /// The cursor to resume from: the next cursor of the last persisted page,
    /// or the starting cursor when nothing was persisted.
    pub last_persisted_cursor: Option<Cursor>,

    /// The last rate limit telemetry observed.
    pub api_rate_limit: Option<FetcherRateLimit>,
}

impl CrawlSummary {
    /// Creates the summary of a crawl starting from `cursor`.
    pub fn starting_from(cursor: Option<Cursor>) -> Self {
        Self {
            last_persisted_cursor: cursor,
            ..Self::default()
        }
    }

    /// The number of repositories written.
    pub fn total_persisted_repositories(&self) -> u32 {
        self.total_inserted_repositories + self.total_updated_repositories
    }

    /// Accounts for a page that has been durably written.
    pub fn record_persisted_page(&mut self, fetched: usize, persisted: &PersistedPage) {
        self.total_pages += 1;
        self.total_fetched_repositories += u32::try_from(fetched).unwrap_or(u32::MAX);
        self.total_inserted_repositories += persisted.total_inserted;
        self.total_updated_repositories += persisted.total_updated;
        self.last_persisted_cursor = persisted.next_cursor.clone();
    }
}

impl Display for CrawlSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Phase: {:?}, Pages: {}, Repositories: fetched={}, inserted={}, updated={}, Cursor: {:?}",
            self.phase,
            self.total_pages,
            self.total_fetched_repositories,
            self.total_inserted_repositories,
            self.total_updated_repositories,
            self.last_persisted_cursor.as_deref()
        )?;
        if let Some(rate_limit) = &self.api_rate_limit {
            write!(f, ", {rate_limit}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_persisted_page_advances_cursor_and_counters() {
        let mut summary = CrawlSummary::starting_from(None);

        summary.record_persisted_page(
            3,
            &PersistedPage {
                total_inserted: 2,
                total_updated: 1,
                next_cursor: Some(Cursor::new("c1")),
            },
        );

        assert_eq!(1, summary.total_pages);
        assert_eq!(3, summary.total_fetched_repositories);
        assert_eq!(3, summary.total_persisted_repositories());
        assert_eq!(Some(Cursor::new("c1")), summary.last_persisted_cursor);
    }

    #[test]
    fn terminal_phases() {
        assert!(CrawlPhase::Complete.is_terminal());
        assert!(CrawlPhase::Aborted.is_terminal());
        assert!(!CrawlPhase::Fetching.is_terminal());
    }
}
