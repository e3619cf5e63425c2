use std::{fmt::Debug, time::Duration};

use super::RetryPolicy;

/// A bearer credential for the GitHub API, redacted in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    /// Creates a new `ApiToken`.
    pub fn new(token: &str) -> Self {
        Self(token.to_string())
    }

    /// Retrieves the raw token.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiToken(***)")
    }
}

/// PostgreSQL connection parameters: either a full URL or its discrete parts.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// A connection string, taking precedence over the discrete parts.
    pub url: Option<String>,
    /// The database host.
    pub host: String,
    /// The database port.
    pub port: u16,
    /// The database name.
    pub name: String,
    /// The database user.
    pub user: String,
    /// The database password.
    pub password: String,
}

impl Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// The immutable configuration of a crawl run, built once at startup.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// The GraphQL endpoint.
    pub api_endpoint: String,

    /// The API credential.
    pub api_token: ApiToken,

    /// The database connection parameters.
    pub database: DatabaseConfig,

    /// The repository search query.
    pub search_query: String,

    /// The number of repositories requested per page.
    pub page_size: u16,

    /// The number of repositories after which the crawl completes.
    pub total_repositories: u32,

    /// The retry/backoff tuning of page fetches.
    pub retry_policy: RetryPolicy,

    /// The remaining budget under which calls wait for the rate limit reset.
    pub rate_limit_reserve: i32,

    /// The maximum number of attempts to write a page.
    pub persist_max_attempts: u32,

    /// The base delay between attempts to write a page.
    pub persist_base_delay: Duration,

    /// The overall wall-clock budget of the crawl.
    pub max_crawl_duration: Option<Duration>,

    /// Whether to resume from the stored checkpoint.
    pub resume: bool,

    /// Whether to create the database schema before crawling.
    pub setup_database: bool,
}
