use crate::{Cursor, Page, PersistedPage, StdResult};

/// A trait for persisting repository data to a storage medium.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RepositoryPersister: Sync + Send {
    /// Persists the page atomically, upserting its repositories, and returns the cursor to resume from.
    async fn persist(&self, page: &Page) -> StdResult<PersistedPage>;

    /// Loads the cursor stored by the last persisted page of an unfinished crawl.
    async fn load_checkpoint(&self) -> StdResult<Option<Cursor>>;
}
