#[cfg(test)]
mod tests;

use super::models::{Mistake, NewMistake, TIMESTAMP_FORMAT, WeakTopic};
use anyhow::{Context, Result};
use chrono::Local;
use sqlx::SqlitePool;
use tracing::debug;

pub struct MistakeQueries;

impl MistakeQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_mistake: NewMistake) -> Result<Mistake> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();

        let id = sqlx::query("INSERT INTO mistakes (topic, question, timestamp) VALUES (?, ?, ?)")
            .bind(&new_mistake.topic)
            .bind(&new_mistake.question)
            .bind(&timestamp)
            .execute(pool)
            .await
            .context("Failed to log mistake")?
            .last_insert_rowid();

        debug!("Logged mistake {} for topic {}", id, new_mistake.topic);

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve logged mistake"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Mistake>> {
        sqlx::query_as::<_, Mistake>(
            "SELECT id, topic, question, timestamp FROM mistakes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get mistake by id")
    }

    #[inline]
    pub async fn list_by_topic(pool: &SqlitePool, topic: &str) -> Result<Vec<Mistake>> {
        sqlx::query_as::<_, Mistake>(
            "SELECT id, topic, question, timestamp FROM mistakes WHERE topic = ? ORDER BY id",
        )
        .bind(topic)
        .fetch_all(pool)
        .await
        .context("Failed to list mistakes for topic")
    }

    /// Topics ordered by mistake count, most frequent first; ties by topic name
    #[inline]
    pub async fn weak_topics(pool: &SqlitePool, limit: u32) -> Result<Vec<WeakTopic>> {
        sqlx::query_as::<_, WeakTopic>(
            r#"
            SELECT topic, COUNT(*) AS mistake_count
            FROM mistakes
            GROUP BY topic
            ORDER BY mistake_count DESC, topic ASC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
        .context("Failed to query weak topics")
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM mistakes")
            .fetch_one(pool)
            .await
            .context("Failed to count mistakes")
    }
}
