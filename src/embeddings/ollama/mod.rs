#[cfg(test)]
mod tests;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{EmbeddingProvider, preview};
use crate::config::{GeneratorSettings, OllamaConfig};
use crate::generation::TextGenerator;
use crate::{Result, StudyError};

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Shared HTTP transport for the Ollama API
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff_unit_ms: u64,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    repeat_penalty: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config.ollama_url()?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            agent,
            retry_attempts: config.retry_attempts.max(1),
            backoff_unit_ms: 1000,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Scale of the exponential backoff between retries
    #[inline]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit_ms = u64::try_from(unit.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> anyhow::Result<()> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build ping URL")?;

        debug!("Pinging Ollama server at {}", url);

        self.make_request_with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Failed to ping Ollama server")?;

        debug!("Server ping successful");
        Ok(())
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        debug!("Fetching available models from {}", url);

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .get(url.as_str())
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Check that `model` is installed on the server
    #[inline]
    pub fn validate_model(&self, model: &str) -> anyhow::Result<()> {
        debug!("Validating model: {}", model);

        let models = self.list_models().context("Failed to list models")?;

        if models.iter().any(|m| m.name == model) {
            debug!("Model {} is available", model);
            Ok(())
        } else {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                model, available_models
            );
            Err(anyhow!(
                "Model '{}' is not available. Available models: {:?}",
                model,
                available_models
            ))
        }
    }

    fn post_json<T: Serialize>(&self, path: &str, body: &T) -> anyhow::Result<String> {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("Failed to build {path} URL"))?;

        let request_json = serde_json::to_string(body).context("Failed to serialize request")?;

        self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> anyhow::Result<String>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE
                            .pow(attempt - 1)
                            .saturating_mul(self.backoff_unit_ms);
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }
}

/// Embedding provider backed by Ollama's `/api/embed`
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    batch_size: usize,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(client: OllamaClient, model: String, batch_size: usize) -> Self {
        Self {
            client,
            model,
            batch_size: batch_size.max(1),
        }
    }

    fn embed_batch(&self, offset: usize, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let describe = || {
            format!(
                "batch at offset {} ({} texts, first: {:?})",
                offset,
                texts.len(),
                texts.first().map(|t| preview(t)).unwrap_or_default()
            )
        };

        let response_text = self
            .client
            .post_json("/api/embed", &request)
            .map_err(|e| StudyError::Provider(format!("Embedding {} failed: {e:#}", describe())))?;

        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            StudyError::Provider(format!(
                "Failed to parse embedding response for {}: {e}",
                describe()
            ))
        })?;

        if response.embeddings.len() != texts.len() {
            return Err(StudyError::Provider(format!(
                "Mismatch between request and response counts for {}: {} vs {}",
                describe(),
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for (index, batch) in texts.chunks(self.batch_size).enumerate() {
            results.extend(self.embed_batch(index * self.batch_size, batch)?);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }
}

/// Text generator backed by Ollama's non-streaming `/api/generate`
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
    settings: GeneratorSettings,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(client: OllamaClient, settings: GeneratorSettings) -> Self {
        Self { client, settings }
    }
}

impl TextGenerator for OllamaGenerator {
    #[inline]
    fn model_name(&self) -> &str {
        &self.settings.model
    }

    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.settings.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.settings.temperature,
                top_p: self.settings.top_p,
                repeat_penalty: self.settings.repeat_penalty,
                num_predict: self.settings.max_tokens,
            },
        };

        debug!(
            "Generating with {} (prompt length: {})",
            self.settings.model,
            prompt.len()
        );

        let response_text = self
            .client
            .post_json("/api/generate", &request)
            .map_err(|e| StudyError::Provider(format!("Generation failed: {e:#}")))?;

        let response: GenerateResponse = serde_json::from_str(&response_text)
            .map_err(|e| StudyError::Provider(format!("Failed to parse generate response: {e}")))?;

        info!(
            "Generated {} characters with {}",
            response.response.len(),
            self.settings.model
        );
        Ok(response.response)
    }
}
