use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::config::Config;
use crate::database::sqlite::models::{Mistake, NewMistake, WeakTopic};
use crate::database::sqlite::queries::MistakeQueries;
use crate::{Result, StudyError};


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

fn store_error(err: anyhow::Error) -> StudyError {
    StudyError::Store(format!("{err:#}"))
}

/// Persistent log of wrong quiz answers
#[derive(Debug, Clone)]
pub struct MistakeTracker {
    pool: DbPool,
}

impl MistakeTracker {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let database_path = database_path.as_ref();

        if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| {
                format!(
                    "Failed to open mistake database {}",
                    database_path.display()
                )
            })
            .map_err(store_error)?;

        let tracker = Self { pool };
        tracker.run_migrations().await?;

        Ok(tracker)
    }

    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.sqlite_database_path()).await
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")
            .map_err(store_error)?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Record a wrong answer, stamped with the local time
    #[inline]
    pub async fn log_mistake(&self, topic: &str, question: &str) -> Result<Mistake> {
        MistakeQueries::create(
            &self.pool,
            NewMistake {
                topic: topic.to_string(),
                question: question.to_string(),
            },
        )
        .await
        .map_err(store_error)
    }

    /// Up to `limit` topics with the most logged mistakes
    #[inline]
    pub async fn weak_topics(&self, limit: u32) -> Result<Vec<WeakTopic>> {
        MistakeQueries::weak_topics(&self.pool, limit)
            .await
            .map_err(store_error)
    }

    #[inline]
    pub async fn mistakes_for_topic(&self, topic: &str) -> Result<Vec<Mistake>> {
        MistakeQueries::list_by_topic(&self.pool, topic)
            .await
            .map_err(store_error)
    }

    #[inline]
    pub async fn mistake_count(&self) -> Result<i64> {
        MistakeQueries::count(&self.pool).await.map_err(store_error)
    }
}
