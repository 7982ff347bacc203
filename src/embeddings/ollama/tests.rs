use super::*;
use serde_json::json;
use std::sync::Arc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method, path},
};

use crate::embeddings::embed_blocking;

fn config_for(server: &MockServer) -> OllamaConfig {
    let url = Url::parse(&server.uri()).expect("mock server uri is a valid url");
    OllamaConfig {
        protocol: "http".to_string(),
        host: url.host_str().unwrap_or("127.0.0.1").to_string(),
        port: url.port().unwrap_or(80),
        timeout_seconds: 5,
        retry_attempts: 2,
    }
}

fn client_for(server: &MockServer) -> OllamaClient {
    OllamaClient::new(&config_for(server))
        .expect("client should build")
        .with_backoff_unit(Duration::from_millis(1))
}

fn texts(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("passage {i}")).collect()
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        timeout_seconds: 30,
        retry_attempts: 4,
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, 4);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&OllamaConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(0)
        .with_backoff_unit(Duration::from_millis(5));

    assert_eq!(client.retry_attempts, 1);
    assert_eq!(client.backoff_unit_ms, 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn embeds_in_configured_batches() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "model": "nomic-embed-text" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0], [0.0, 1.0]]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OllamaEmbedder::new(
        client_for(&server),
        "nomic-embed-text".to_string(),
        2,
    ));

    let vectors = embed_blocking(Arc::clone(&embedder), texts(4))
        .await
        .expect("embedding should succeed");

    assert_eq!(vectors.len(), 4);
    assert_eq!(vectors[2], vec![1.0, 0.0]);
    assert_eq!(embedder.model_name(), "nomic-embed-text");
}

#[tokio::test(flavor = "multi_thread")]
async fn count_mismatch_names_the_batch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0]]
        })))
        .mount(&server)
        .await;

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OllamaEmbedder::new(
        client_for(&server),
        "nomic-embed-text".to_string(),
        3,
    ));

    let err = embed_blocking(embedder, texts(3))
        .await
        .expect_err("a short response must fail");

    assert!(matches!(err, StudyError::Provider(_)));
    let message = err.to_string();
    assert!(message.contains("offset 0"), "unexpected message: {message}");
    assert!(message.contains("passage 0"), "unexpected message: {message}");
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .expect(1)
        .mount(&server)
        .await;

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OllamaEmbedder::new(
        client_for(&server),
        "missing-model".to_string(),
        8,
    ));

    let err = embed_blocking(embedder, texts(1))
        .await
        .expect_err("404 must fail");
    assert!(err.to_string().contains("404"));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.5, 0.5]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OllamaEmbedder::new(
        client_for(&server),
        "nomic-embed-text".to_string(),
        8,
    ));

    let vectors = embed_blocking(embedder, texts(1))
        .await
        .expect("second attempt should succeed");
    assert_eq!(vectors, vec![vec![0.5, 0.5]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn generator_sends_sampling_options() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "llama3.1:8b",
            "stream": false,
            "options": { "num_predict": 1024 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.1:8b",
            "response": "A GRU has two gates.",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator: Arc<dyn TextGenerator> = Arc::new(OllamaGenerator::new(
        client_for(&server),
        GeneratorSettings::default(),
    ));

    let answer = crate::generation::generate_blocking(generator, "How many gates?".to_string())
        .await
        .expect("generation should succeed");
    assert_eq!(answer, "A GRU has two gates.");
}

#[tokio::test(flavor = "multi_thread")]
async fn validate_model_lists_tags() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "nomic-embed-text:latest", "size": 274302450 }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = tokio::task::spawn_blocking(move || {
        (
            client.validate_model("nomic-embed-text:latest").is_ok(),
            client.validate_model("llama3.1:8b").is_ok(),
        )
    })
    .await
    .expect("blocking task should join");

    assert_eq!(result, (true, false));
}
