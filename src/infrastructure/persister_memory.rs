use std::{collections::HashMap, sync::Arc, sync::Mutex};

use chrono::{DateTime, Utc};

use crate::{
    Clock, Cursor, Page, PersistedPage, Repository, RepositoryId, RepositoryPersister, StdResult,
};

/// A stored repository row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRepository {
    pub repository: Repository,
    pub crawled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persister keeping rows in memory with the same upsert contract as the database, `(owner, name)` included.
pub struct InMemoryPersister {
    clock: Arc<dyn Clock>,
    rows: Mutex<HashMap<RepositoryId, StoredRepository>>,
    checkpoint: Mutex<Option<Cursor>>,
}

impl InMemoryPersister {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            rows: Mutex::new(HashMap::new()),
            checkpoint: Mutex::new(None),
        }
    }

    pub fn row(&self, id: &str) -> Option<StoredRepository> {
        self.rows
            .lock()
            .unwrap()
            .get(&RepositoryId(id.to_string()))
            .cloned()
    }

    pub fn total_rows(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl RepositoryPersister for InMemoryPersister {
    async fn persist(&self, page: &Page) -> StdResult<PersistedPage> {
        let now = self.clock.now();
        let mut persisted = PersistedPage {
            next_cursor: page.next_cursor().cloned(),
            ..PersistedPage::default()
        };
        let mut rows = self.rows.lock().unwrap();
        for repository in page.repositories() {
            rows.retain(|id, row| {
                id == repository.id()
                    || row.repository.owner() != repository.owner()
                    || row.repository.name() != repository.name()
            });
            match rows.get_mut(repository.id()) {
                Some(row) => {
                    row.repository = repository.clone();
                    row.updated_at = now;
                    persisted.total_updated += 1;
                }
                None => {
                    rows.insert(
                        repository.id().clone(),
                        StoredRepository {
                            repository: repository.clone(),
                            crawled_at: now,
                            updated_at: now,
                        },
                    );
                    persisted.total_inserted += 1;
                }
            }
        }
        *self.checkpoint.lock().unwrap() = persisted.next_cursor.clone();

        Ok(persisted)
    }

    async fn load_checkpoint(&self) -> StdResult<Option<Cursor>> {
        Ok(self.checkpoint.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{FakeClock, StarsCounter};

    use super::*;

    #[tokio::test]
    async fn persist_same_page_twice_is_idempotent() {
        let clock = Arc::new(FakeClock::dummy());
        let persister = InMemoryPersister::new(clock.clone());
        let page = Page::new(
            vec![
                Repository::dummy("1", "a/x", 10),
                Repository::dummy("2", "a/y", 5),
            ],
            Some(Cursor::new("c1")),
        );

        persister.persist(&page).await.unwrap();
        let first_row = persister.row("1").unwrap();
        clock.sleep(Duration::from_secs(1)).await;
        let second = persister.persist(&page).await.unwrap();
        let second_row = persister.row("1").unwrap();

        assert_eq!(2, persister.total_rows());
        assert_eq!((0, 2), (second.total_inserted, second.total_updated));
        assert_eq!(first_row.repository, second_row.repository);
        assert_eq!(first_row.crawled_at, second_row.crawled_at);
        assert!(second_row.updated_at > first_row.updated_at);
    }

    #[tokio::test]
    async fn persist_updates_stars_and_keeps_first_observation() {
        let clock = Arc::new(FakeClock::dummy());
        let persister = InMemoryPersister::new(clock.clone());

        persister
            .persist(&Page::new(vec![Repository::dummy("1", "a/x", 10)], None))
            .await
            .unwrap();
        let first_row = persister.row("1").unwrap();
        clock.sleep(Duration::from_secs(60)).await;
        persister
            .persist(&Page::new(vec![Repository::dummy("1", "a/x", 12)], None))
            .await
            .unwrap();
        let row = persister.row("1").unwrap();

        assert_eq!(StarsCounter(12), row.repository.stars());
        assert_eq!(first_row.crawled_at, row.crawled_at);
        assert!(row.updated_at > first_row.updated_at);
    }

    #[tokio::test]
    async fn persist_frees_name_of_renamed_repository() {
        let persister = InMemoryPersister::new(Arc::new(FakeClock::dummy()));

        persister
            .persist(&Page::new(vec![Repository::dummy("a", "o/x", 10)], None))
            .await
            .unwrap();
        let persisted = persister
            .persist(&Page::new(
                vec![
                    Repository::dummy("b", "o/x", 1),
                    Repository::dummy("a", "o/y", 11),
                ],
                None,
            ))
            .await
            .unwrap();

        assert_eq!(2, persisted.total_written());
        assert_eq!(2, persister.total_rows());
        assert_eq!(
            Repository::dummy("b", "o/x", 1),
            persister.row("b").unwrap().repository
        );
        assert_eq!(
            Repository::dummy("a", "o/y", 11),
            persister.row("a").unwrap().repository
        );
    }
}
