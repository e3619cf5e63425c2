use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use log::warn;

use crate::{Clock, Cursor, Page, PersistedPage, RepositoryPersister, StdResult};

/// Retries writing a page when the store fails, waiting `base_delay * 2^attempt` between attempts.
///
/// A page is written in a single transaction, so replaying it after a failure never duplicates rows.
pub struct PersisterRetrier {
    /// The persister to be retried.
    persister: Arc<dyn RepositoryPersister>,
    /// The maximum number of attempts for a page.
    max_attempts: u32,
    /// The base delay for exponential backoff.
    base_delay: Duration,
    /// The source of time used to wait between attempts.
    clock: Arc<dyn Clock>,
}

impl PersisterRetrier {
    /// Creates a new `PersisterRetrier` instance with the given maximum number of attempts.
    pub fn new(
        persister: Arc<dyn RepositoryPersister>,
        max_attempts: u32,
        base_delay: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            persister,
            max_attempts,
            base_delay,
            clock,
        }
    }

    fn calculate_exponential_backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * (2u32.pow(attempt.min(31)))
    }
}

#[async_trait::async_trait]
impl RepositoryPersister for PersisterRetrier {
    async fn persist(&self, page: &Page) -> StdResult<PersistedPage> {
        let mut attempts = 0;

        loop {
            match self.persister.persist(page).await {
                Ok(persisted) => return Ok(persisted),
                Err(e) => {
                    attempts += 1;
                    warn!(
                        "Writing page of {} repositories (next cursor {:?}) failed, attempt #{attempts}: {e:#}",
                        page.repositories().len(),
                        page.next_cursor().map(|cursor| cursor.0.as_str()),
                    );
                    if attempts >= self.max_attempts {
                        return Err(anyhow!(
                            "Page could not be written after {attempts} attempts: {e:#}"
                        ));
                    }
                    self.clock
                        .sleep(self.calculate_exponential_backoff_delay(attempts))
                        .await;
                }
            }
        }
    }

    async fn load_checkpoint(&self) -> StdResult<Option<Cursor>> {
        self.persister.load_checkpoint().await
    }
}
