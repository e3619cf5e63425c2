use std::time::Duration;

use thiserror::Error;

use super::{CrawlSummary, TransientKind};

/// The standard result type used throughout the application.
pub type StdResult<T> = Result<T, anyhow::Error>;

/// Why the retrier gave up fetching a page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The API rejected the call permanently
    #[error("Fatal fetch failure: {0}")]
    Fatal(String),

    /// Transient failures kept happening
    #[error("Giving up after {attempts} attempts, last {kind}: {message}")]
    RetriesExhausted {
        /// The number of failed attempts.
        attempts: u32,
        /// The kind of the last failure.
        kind: TransientKind,
        /// The last failure description.
        message: String,
    },

    /// The API kept returning responses that do not match the expected schema
    #[error("Response schema mismatch repeated {attempts} times, last: {message}")]
    MalformedResponse {
        /// The number of malformed responses received.
        attempts: u32,
        /// The last parsing failure.
        message: String,
    },

    /// Waiting any longer would overrun the crawl deadline
    #[error("Crawl deadline exceeded, a wait of {wait:?} was required")]
    DeadlineExceeded {
        /// The wait that was refused.
        wait: Duration,
    },
}

/// The terminal ABORTED state of a crawl.
#[derive(Error, Debug)]
#[error("Crawl aborted, resume from cursor {:?}: {reason:#}", .summary.last_persisted_cursor.as_deref())]
pub struct CrawlAborted {
    /// What made the crawl stop.
    pub reason: anyhow::Error,

    /// The progress made before aborting.
    pub summary: CrawlSummary,
}
