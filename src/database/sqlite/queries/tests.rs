use super::*;
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;

async fn create_test_pool() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&db_path)
                .create_if_missing(true),
        )
        .await
        .expect("Failed to create test pool");

    sqlx::raw_sql(include_str!("../migrations/001_create_mistakes.sql"))
        .execute(&pool)
        .await
        .expect("Failed to run migrations");

    (temp_dir, pool)
}

fn mistake(topic: &str, question: &str) -> NewMistake {
    NewMistake {
        topic: topic.to_string(),
        question: question.to_string(),
    }
}

#[tokio::test]
async fn mistake_crud_operations() {
    let (_temp_dir, pool) = create_test_pool().await;

    let created = MistakeQueries::create(&pool, mistake("RNNs", "What is a GRU?"))
        .await
        .expect("should log mistake");
    assert_eq!(created.topic, "RNNs");
    assert_eq!(created.question, "What is a GRU?");

    let fetched = MistakeQueries::get_by_id(&pool, created.id)
        .await
        .expect("should query mistake")
        .expect("mistake should exist");
    assert_eq!(fetched, created);

    assert!(
        MistakeQueries::get_by_id(&pool, created.id + 100)
            .await
            .expect("should query mistake")
            .is_none()
    );
}

#[tokio::test]
async fn weak_topics_group_and_order() {
    let (_temp_dir, pool) = create_test_pool().await;

    for (topic, question) in [("A", "q1"), ("B", "q2"), ("A", "q3")] {
        MistakeQueries::create(&pool, mistake(topic, question))
            .await
            .expect("should log mistake");
    }

    let weak = MistakeQueries::weak_topics(&pool, 3)
        .await
        .expect("should query weak topics");
    assert_eq!(
        weak,
        vec![
            WeakTopic {
                topic: "A".to_string(),
                mistake_count: 2
            },
            WeakTopic {
                topic: "B".to_string(),
                mistake_count: 1
            },
        ]
    );
}

#[tokio::test]
async fn weak_topics_respect_limit_and_tie_order() {
    let (_temp_dir, pool) = create_test_pool().await;

    for topic in ["Zeta", "Alpha", "Mid", "Mid"] {
        MistakeQueries::create(&pool, mistake(topic, "question"))
            .await
            .expect("should log mistake");
    }

    let weak = MistakeQueries::weak_topics(&pool, 2)
        .await
        .expect("should query weak topics");
    let topics: Vec<&str> = weak.iter().map(|w| w.topic.as_str()).collect();
    assert_eq!(topics, vec!["Mid", "Alpha"]);

    assert_eq!(MistakeQueries::count(&pool).await.expect("count"), 4);
    assert_eq!(
        MistakeQueries::list_by_topic(&pool, "Mid")
            .await
            .expect("list")
            .len(),
        2
    );
}
