use axum::http::StatusCode;
use thiserror::Error;

/// Errors surfaced by the prompt pipeline. Every variant carries enough
/// detail for the caller to decide whether a retry makes sense; nothing
/// is retried internally.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Prompt template not found for {pipeline}/{stage}")]
    TemplateNotFound { pipeline: String, stage: String },

    #[error("Cannot connect to generation service: {0}")]
    ServiceUnavailable(String),

    #[error("Generation request timed out")]
    RequestTimeout,

    #[error("Generation service error: {detail}")]
    UpstreamError { status: Option<u16>, detail: String },

    #[error("Failed to parse JSON response: {0}")]
    MalformedResponse(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl PipelineError {
    /// HTTP status the routing layer reports for this error kind.
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::TemplateNotFound { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PipelineError::ServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            PipelineError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            PipelineError::UpstreamError { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::MalformedResponse(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PipelineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(e: rusqlite::Error) -> Self {
        PipelineError::Database(e.to_string())
    }
}

impl From<r2d2::Error> for PipelineError {
    fn from(e: r2d2::Error) -> Self {
        PipelineError::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineError;
    use axum::http::StatusCode;

    #[test]
    fn status_mapping_matches_error_kind() {
        let cases = [
            (
                PipelineError::TemplateNotFound {
                    pipeline: "freeform".to_string(),
                    stage: "extract".to_string(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PipelineError::ServiceUnavailable("refused".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (PipelineError::RequestTimeout, StatusCode::REQUEST_TIMEOUT),
            (
                PipelineError::UpstreamError {
                    status: Some(500),
                    detail: "boom".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                PipelineError::MalformedResponse("no JSON".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PipelineError::SessionNotFound("abc".to_string()),
                StatusCode::NOT_FOUND,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status(), expected, "for {:?}", error);
        }
    }
}
