use crate::error::PipelineError;
use crate::generation::{GenerationClient, GenerationRequest};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// What the fake client should do for one call.
#[derive(Debug, Clone)]
enum FakeReply {
    Text(String),
    ServiceUnavailable,
    Timeout,
    UpstreamStatus(u16),
}

/// A fake generation client for testing.
///
/// Replies are queued with the builder methods and returned in order;
/// once the queue is empty a default response is returned. Every call
/// is recorded so tests can assert on what was (or was not) sent.
pub struct FakeGenerationClient {
    replies: Mutex<Vec<FakeReply>>,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl Default for FakeGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGenerationClient {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(vec![]),
            requests: Mutex::new(vec![]),
        }
    }

    /// Queue a text response.
    pub fn with_response(self, response: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push(FakeReply::Text(response.to_string()));
        self
    }

    /// Queue multiple text responses, returned in sequence.
    pub fn with_responses(self, responses: Vec<&str>) -> Self {
        {
            let mut replies = self.replies.lock().unwrap();
            for response in responses {
                replies.push(FakeReply::Text(response.to_string()));
            }
        }
        self
    }

    /// Queue a connection failure.
    pub fn with_service_unavailable(self) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push(FakeReply::ServiceUnavailable);
        self
    }

    /// Queue a timeout.
    pub fn with_timeout(self) -> Self {
        self.replies.lock().unwrap().push(FakeReply::Timeout);
        self
    }

    /// Queue a non-success status from the upstream service.
    pub fn with_upstream_status(self, status: u16) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push(FakeReply::UpstreamStatus(status));
        self
    }

    /// Number of calls the fake has received.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationClient for FakeGenerationClient {
    async fn generate(
        &self,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, PipelineError> {
        self.requests.lock().unwrap().push(GenerationRequest {
            prompt: prompt.to_string(),
            timeout,
        });

        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.is_empty() {
            FakeReply::Text("Fake default response".to_string())
        } else {
            replies.remove(0)
        };

        match reply {
            FakeReply::Text(text) => Ok(text),
            FakeReply::ServiceUnavailable => {
                Err(PipelineError::ServiceUnavailable(
                    "fake connection refused".to_string(),
                ))
            }
            FakeReply::Timeout => Err(PipelineError::RequestTimeout),
            FakeReply::UpstreamStatus(status) => {
                Err(PipelineError::UpstreamError {
                    status: Some(status),
                    detail: "fake upstream error".to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn responses_are_returned_in_sequence() {
        let client = FakeGenerationClient::new()
            .with_response("first")
            .with_response("second");

        let timeout = Duration::from_secs(1);
        assert_eq!(client.generate("a", timeout).await.unwrap(), "first");
        assert_eq!(client.generate("b", timeout).await.unwrap(), "second");
        assert_eq!(
            client.generate("c", timeout).await.unwrap(),
            "Fake default response"
        );
    }

    #[tokio::test]
    async fn error_replies_surface_as_typed_errors() {
        let client = FakeGenerationClient::new()
            .with_service_unavailable()
            .with_timeout()
            .with_upstream_status(502);

        let timeout = Duration::from_secs(1);
        assert!(matches!(
            client.generate("a", timeout).await.unwrap_err(),
            PipelineError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            client.generate("b", timeout).await.unwrap_err(),
            PipelineError::RequestTimeout
        ));
        assert!(matches!(
            client.generate("c", timeout).await.unwrap_err(),
            PipelineError::UpstreamError {
                status: Some(502),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn requests_are_recorded() {
        let client = FakeGenerationClient::new().with_response("ok");
        let _ = client
            .generate("the prompt", Duration::from_secs(30))
            .await
            .unwrap();

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "the prompt");
        assert_eq!(requests[0].timeout, Duration::from_secs(30));
    }
}
