#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance
// Run with: cargo test --test integration_ollama -- --ignored

use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use study_assistant::config::{GeneratorSettings, OllamaConfig};
use study_assistant::embeddings::{EmbeddingProvider, OllamaClient, OllamaEmbedder, OllamaGenerator};
use study_assistant::features::{AnswerGrader, is_correct};
use study_assistant::generation::TextGenerator;

const TEST_EMBEDDING_MODEL: &str = "nomic-embed-text:latest";
const TEST_GENERATOR_MODEL: &str = "llama3.1:8b";

fn create_integration_test_client() -> OllamaClient {
    let mut config = OllamaConfig::default();
    if let Ok(host) = env::var("OLLAMA_HOST") {
        config.host = host;
    }
    if let Some(port) = env::var("OLLAMA_PORT").ok().and_then(|p| p.parse().ok()) {
        config.port = port;
    }

    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(120))
        .with_retry_attempts(3)
}

fn embedder() -> OllamaEmbedder {
    let model = env::var("OLLAMA_EMBEDDING_MODEL").unwrap_or_else(|_| TEST_EMBEDDING_MODEL.to_string());
    OllamaEmbedder::new(create_integration_test_client(), model, 8)
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_ping_and_models() {
    init_test_tracing();
    let client = create_integration_test_client();

    client.ping().expect("Ollama should be reachable");
    let models = client.list_models().expect("should list models");
    info!("Ollama has {} models installed", models.len());

    client
        .validate_model(TEST_EMBEDDING_MODEL)
        .expect("embedding model should be installed");
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_embeddings_are_consistent() {
    init_test_tracing();
    let embedder = embedder();

    let texts = vec![
        "A GRU has two gates".to_string(),
        "Max pooling downsamples feature maps".to_string(),
        "A GRU has two gates".to_string(),
    ];
    let vectors = embedder.embed(&texts).expect("should embed");

    assert_eq!(vectors.len(), 3);
    assert!(vectors.iter().all(|v| v.len() == vectors[0].len()));
    assert!(!vectors[0].is_empty());
    assert_eq!(vectors[0], vectors[2]);
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_semantic_grading() {
    init_test_tracing();
    let embedder = embedder();

    assert!(
        is_correct(
            &embedder,
            "An RNN processes sequences",
            "An RNN processes sequences",
            0.85
        )
        .expect("should grade")
    );
    assert!(
        is_correct(
            &embedder,
            "A GRU has two gates",
            "There are two gates in a GRU",
            0.85
        )
        .expect("should grade")
    );
    assert!(
        !is_correct(&embedder, "A GRU has two gates", "The sky is blue", 0.85)
            .expect("should grade")
    );
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Ollama instance"]
async fn real_grader_runs_off_the_runtime() {
    init_test_tracing();
    let grader = AnswerGrader::new(Arc::new(embedder()), 0.85).expect("valid threshold");

    assert!(
        grader
            .grade("A GRU has two gates", "There are two gates in a GRU")
            .await
            .expect("should grade")
    );
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_generation() {
    init_test_tracing();
    let model = env::var("OLLAMA_GENERATOR_MODEL").unwrap_or_else(|_| TEST_GENERATOR_MODEL.to_string());
    let generator = OllamaGenerator::new(
        create_integration_test_client(),
        GeneratorSettings {
            model,
            max_tokens: 32,
            ..GeneratorSettings::default()
        },
    );

    let reply = generator
        .generate("Reply with the single word: ready")
        .expect("should generate");
    info!("Generator replied: {}", reply);
    assert!(!reply.trim().is_empty());
}
