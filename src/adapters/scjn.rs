use crate::config::SourceConfig;
use crate::domain::model::{FetchOutcome, ThesisPayload, NOT_AVAILABLE};
use crate::domain::ports::ThesisSource;
use crate::domain::services::extract_materia;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Client for the SCJN "Bicentenario" thesis repository.
#[derive(Debug, Clone)]
pub struct ScjnClient {
    client: Client,
    endpoint: String,
}

impl ScjnClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn thesis_url(&self, registro: &str) -> String {
        format!("{}/{}", self.endpoint, registro)
    }
}

/// Pulls the fields we archive out of a thesis response body.
pub fn parse_thesis(data: &Value) -> ThesisPayload {
    let text = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let epoca = data
        .get("epoca")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string();

    ThesisPayload {
        rubro: text("rubro"),
        texto: text("texto"),
        epoca,
        materia: extract_materia(data),
    }
}

#[async_trait]
impl ThesisSource for ScjnClient {
    async fn fetch(&self, registro: &str) -> Result<FetchOutcome> {
        let url = self.thesis_url(registro);
        tracing::debug!("Fetching thesis from: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        tracing::debug!("SCJN response status for {}: {}", registro, status);

        if status != StatusCode::OK {
            return Ok(FetchOutcome::Status(status.as_u16()));
        }

        let data: Value = response.json().await?;
        Ok(FetchOutcome::Found(parse_thesis(&data)))
    }
}
