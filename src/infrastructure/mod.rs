#[cfg(test)]
mod clock_fake;
mod clock_tokio;
mod crawler_sequential;
mod fetcher_graphql;
mod fetcher_rate_limiter;
mod fetcher_retrier;
#[cfg(test)]
mod persister_memory;
mod persister_postgresql;
mod persister_retrier;
mod query_graphql;

#[cfg(test)]
pub use clock_fake::*;
pub use clock_tokio::*;
pub use crawler_sequential::*;
pub use fetcher_graphql::*;
pub use fetcher_rate_limiter::*;
pub use fetcher_retrier::*;
#[cfg(test)]
pub use persister_memory::*;
pub use persister_postgresql::*;
pub use persister_retrier::*;
pub use query_graphql::*;
