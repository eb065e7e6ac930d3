use crate::error::PipelineError;
use crate::generation::GenerationClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Client for an Ollama-style local generation endpoint.
///
/// The model name is client configuration, not caller input; every
/// request goes to `{base_url}/api/generate` with `stream: false`.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            model,
        }
    }
}

fn classify_transport_error(e: reqwest::Error) -> PipelineError {
    if e.is_timeout() {
        PipelineError::RequestTimeout
    } else if e.is_connect() {
        PipelineError::ServiceUnavailable(e.to_string())
    } else {
        PipelineError::UpstreamError {
            status: None,
            detail: e.to_string(),
        }
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    #[instrument(skip(self, prompt), fields(model = %self.model), err)]
    async fn generate(
        &self,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, PipelineError> {
        let url =
            format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        debug!("Sending {} byte prompt to {}", prompt.len(), url);

        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_else(|e| {
                format!("could not read error body: {}", e)
            });
            return Err(PipelineError::UpstreamError {
                status: Some(status.as_u16()),
                detail,
            });
        }

        let envelope: GenerateResponse =
            response.json().await.map_err(|e| {
                PipelineError::UpstreamError {
                    status: None,
                    detail: format!("invalid response envelope: {}", e),
                }
            })?;

        Ok(envelope.response.unwrap_or_default())
    }
}
