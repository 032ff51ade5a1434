use crate::core::llm::LlmError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("no API key configured: pass apiKey in the request or set one on the server")]
    MissingApiKey,
    #[error("could not parse the outline returned by the model: {0}")]
    MalformedOutline(String),
    #[error(transparent)]
    Upstream(#[from] LlmError),
    #[error("generation cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn http_status(&self) -> u16 {
        match self {
            PipelineError::InvalidRequest(_) => 400,
            PipelineError::MissingApiKey | PipelineError::MalformedOutline(_) => 500,
            PipelineError::Upstream(e) => e.status(),
            PipelineError::Cancelled => 499,
        }
    }
}
