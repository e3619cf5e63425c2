use std::{fmt::Display, time::Duration};

use chrono::{DateTime, Utc};

use super::{Cursor, FetcherRateLimit, Repository};

/// One batch of repositories returned by a single paginated query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Retrieved repositories and their metadata
    pub(crate) repositories: Vec<Repository>,

    /// The cursor of the following page, `None` when the result stream is exhausted
    pub(crate) next_cursor: Option<Cursor>,
}

impl Page {
    /// Creates a new `Page` instance.
    pub fn new(repositories: Vec<Repository>, next_cursor: Option<Cursor>) -> Self {
        Self {
            repositories,
            next_cursor,
        }
    }

    /// Retrieves the list of repositories.
    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    /// Retrieves the cursor of the following page.
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref()
    }
}

/// A response containing a page of public repositories and the API telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The fetched page
    pub(crate) page: Page,

    /// The API rate limit information
    pub(crate) rate_limit: FetcherRateLimit,
}

impl Response {
    /// Creates a new `Response` instance with the given page.
    pub fn new(page: Page, rate_limit: FetcherRateLimit) -> Self {
        Self { page, rate_limit }
    }

    /// Retrieves the fetched page.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Retrieves the API rate limit information.
    pub fn rate_limit(&self) -> &FetcherRateLimit {
        &self.rate_limit
    }
}

/// The kind of rate limit the API signalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKind {
    /// The call budget of the current window is exhausted.
    Primary,

    /// A short window throttle, independent from the call budget.
    Secondary,
}

/// A rate limit signal and the hints the API gave to resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSignal {
    /// The kind of limit hit.
    pub kind: RateLimitKind,

    /// The time at which the budget resets, if reported.
    pub resume_at: Option<DateTime<Utc>>,

    /// The wait suggested by the API, if reported.
    pub retry_after: Option<Duration>,

    /// The message returned by the API.
    pub message: String,
}

/// The kind of a recoverable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// Connection, timeout or body read error.
    Network,

    /// Server side (5xx) error.
    Server,

    /// Response that could not be parsed into the expected shape.
    MalformedResponse,
}

impl Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientKind::Network => write!(f, "network error"),
            TransientKind::Server => write!(f, "server error"),
            TransientKind::MalformedResponse => write!(f, "malformed response"),
        }
    }
}

/// The classified outcome of a single fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A page was fetched.
    Success(Response),

    /// The API refused the call because of a rate limit.
    RateLimited(RateLimitSignal),

    /// The call failed in a way a retry may recover from.
    Transient {
        /// The kind of failure.
        kind: TransientKind,
        /// The failure description.
        message: String,
    },

    /// The call failed permanently: bad credentials or an invalid request.
    Fatal(String),
}

impl FetchOutcome {
    /// Creates a transient outcome.
    pub fn transient(kind: TransientKind, message: impl Into<String>) -> Self {
        Self::Transient {
            kind,
            message: message.into(),
        }
    }

    /// Creates a fatal outcome.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }
}

/// The result of durably writing a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedPage {
    /// The number of repositories inserted for the first time.
    pub total_inserted: u32,

    /// The number of repositories already stored and refreshed.
    pub total_updated: u32,

    /// The cursor to resume from, `None` when the result stream is exhausted.
    pub next_cursor: Option<Cursor>,
}

impl PersistedPage {
    /// The number of repositories written by the page.
    pub fn total_written(&self) -> u32 {
        self.total_inserted + self.total_updated
    }
}
