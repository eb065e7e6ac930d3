pub mod fake;
pub mod ollama;

use crate::error::PipelineError;
use async_trait::async_trait;
use std::time::Duration;

/// A prompt that was sent to a generation client, recorded by the fake
/// implementation for verification in tests.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub timeout: Duration,
}

/// Abstracts the text-generation service so the pipeline can be tested
/// without a running model host.
///
/// Implementations issue a single synchronous call per invocation. No
/// retries happen at this layer; callers decide whether a retry against
/// a slow local model is worth compounding the load.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Send a rendered prompt and return the generated text verbatim.
    ///
    /// The timeout is mandatory: local model inference routinely takes
    /// tens of seconds to minutes, and a caller that abandons the wait
    /// leaves the upstream call running.
    async fn generate(
        &self,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, PipelineError>;
}
