use log::{debug, info};
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};

use crate::{Cursor, DatabaseConfig, Page, PersistedPage, RepositoryPersister, StdResult};

const SCHEMA_STATEMENTS: [&str; 3] = [
    r#"
CREATE TABLE IF NOT EXISTS repositories (
    id VARCHAR(255) PRIMARY KEY,
    owner VARCHAR(255) NOT NULL,
    name VARCHAR(255) NOT NULL,
    url VARCHAR(2048) NOT NULL,
    stars INT NOT NULL CHECK (stars >= 0),
    crawled_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP
)
    "#,
    r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_repositories_owner_name ON repositories (owner, name)
    "#,
    r#"
CREATE TABLE IF NOT EXISTS crawl_checkpoints (
    crawl_key TEXT PRIMARY KEY,
    cursor TEXT,
    completed BOOLEAN NOT NULL DEFAULT FALSE,
    updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP
)
    "#,
];

/// Frees the `(owner, name)` pair held by another repository, renamed or deleted since it was stored.
const DELETE_STALE_FULL_NAME: &str = r#"
DELETE FROM repositories
WHERE owner = $1 AND name = $2 AND id <> $3
"#;

const UPSERT_REPOSITORY: &str = r#"
INSERT INTO repositories (id, owner, name, url, stars, crawled_at, updated_at)
VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
ON CONFLICT (id) DO UPDATE
SET owner = EXCLUDED.owner,
    name = EXCLUDED.name,
    url = EXCLUDED.url,
    stars = EXCLUDED.stars,
    updated_at = EXCLUDED.updated_at
RETURNING xmax = 0 AS inserted
"#;

const UPSERT_CHECKPOINT: &str = r#"
INSERT INTO crawl_checkpoints (crawl_key, cursor, completed, updated_at)
VALUES ($1, $2, $3, NOW())
ON CONFLICT (crawl_key) DO UPDATE
SET cursor = EXCLUDED.cursor,
    completed = EXCLUDED.completed,
    updated_at = EXCLUDED.updated_at
"#;

const SELECT_CHECKPOINT: &str = r#"
SELECT cursor
FROM crawl_checkpoints
WHERE crawl_key = $1 AND NOT completed
"#;

/// A persister that stores repository metadata in a PostgreSQL database.
pub struct PostgresSqlPersister {
    pool: PgPool,

    /// The key under which the crawl checkpoint is stored.
    crawl_key: String,
}

impl PostgresSqlPersister {
    /// Creates a new `PostgresSqlPersister` instance, checkpointing under `crawl_key`.
    pub async fn try_new(database: &DatabaseConfig, crawl_key: &str) -> StdResult<Self> {
        Ok(Self {
            pool: PgPoolOptions::new()
                .max_connections(1)
                .connect_with(Self::connect_options(database)?)
                .await?,
            crawl_key: crawl_key.to_string(),
        })
    }

    fn connect_options(database: &DatabaseConfig) -> StdResult<PgConnectOptions> {
        match &database.url {
            Some(url) => Ok(url.parse()?),
            None => Ok(PgConnectOptions::new()
                .host(&database.host)
                .port(database.port)
                .database(&database.name)
                .username(&database.user)
                .password(&database.password)),
        }
    }

    /// Creates the repositories and checkpoints tables if they do not exist.
    pub async fn setup_schema(&self) -> StdResult<()> {
        let mut transaction = self.pool.begin().await?;
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement).execute(&mut *transaction).await?;
        }
        transaction.commit().await?;
        info!("Database schema is set up");

        Ok(())
    }
}

#[async_trait::async_trait]
impl RepositoryPersister for PostgresSqlPersister {
    async fn persist(&self, page: &Page) -> StdResult<PersistedPage> {
        let mut persisted = PersistedPage {
            next_cursor: page.next_cursor().cloned(),
            ..PersistedPage::default()
        };
        let mut transaction = self.pool.begin().await?;
        for repository in page.repositories() {
            let repository_stars = i32::try_from(*repository.stars())?;
            let stale = sqlx::query(DELETE_STALE_FULL_NAME)
                .bind(repository.owner().as_str())
                .bind(repository.name().as_str())
                .bind(repository.id().as_str())
                .execute(&mut *transaction)
                .await?;
            if stale.rows_affected() > 0 {
                debug!("Removed stale repository holding the name of {repository}");
            }
            let (inserted,): (bool,) = sqlx::query_as(UPSERT_REPOSITORY)
                .bind(repository.id().as_str())
                .bind(repository.owner().as_str())
                .bind(repository.name().as_str())
                .bind(repository.url().as_str())
                .bind(repository_stars)
                .fetch_one(&mut *transaction)
                .await?;
            if inserted {
                debug!("Inserted {repository}");
                persisted.total_inserted += 1;
            } else {
                debug!("Updated {repository}");
                persisted.total_updated += 1;
            }
        }
        sqlx::query(UPSERT_CHECKPOINT)
            .bind(self.crawl_key.as_str())
            .bind(persisted.next_cursor.as_ref().map(|cursor| cursor.as_str()))
            .bind(persisted.next_cursor.is_none())
            .execute(&mut *transaction)
            .await?;
        transaction.commit().await?;

        Ok(persisted)
    }

    async fn load_checkpoint(&self) -> StdResult<Option<Cursor>> {
        let row: Option<(Option<String>,)> = sqlx::query_as(SELECT_CHECKPOINT)
            .bind(self.crawl_key.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|(cursor,)| cursor).map(Cursor))
    }
}
