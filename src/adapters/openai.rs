//! Embeddings through the OpenAI HTTP API (or any compatible server).

use crate::config::EmbeddingConfig;
use crate::domain::ports::Embedder;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    attempts: u32,
    retry_delay: Duration,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| EtlError::MissingConfigError {
                field: "embedding.api_key".to_string(),
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            attempts: config.attempts.max(1),
            retry_delay: config.retry_delay(),
        })
    }

    async fn request_once(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                input: text,
                model: &self.model,
            })
            .send()
            .await?
            .error_for_status()?;

        let body: EmbeddingResponse = response.json().await?;
        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EtlError::ProcessingError {
                message: "embedding response contained no data".to_string(),
            })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut last_error = String::new();

        for attempt in 1..=self.attempts {
            match self.request_once(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) => {
                    tracing::warn!(
                        "❌ Embedding attempt {}/{} failed: {}",
                        attempt,
                        self.attempts,
                        e
                    );
                    last_error = e.to_string();
                    if attempt < self.attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(EtlError::EmbeddingError {
            attempts: self.attempts,
            message: last_error,
        })
    }
}
