//! Service/port-level error enums (SPEC_FULL §10.2), one per outbound port
//! plus the pipeline services that compose them — mirroring the teacher's
//! `QueueError`/`ComfyUIError`/`LLMServiceError` style (named variants,
//! `#[error("...: {0}")]`). Each converts into `domain::errors::DomainError`
//! so callers can classify a failure into the §7 taxonomy without matching
//! on every concrete variant.

use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("repository backend error: {0}")]
    Backend(String),
}

impl From<RepositoryError> for DomainError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => DomainError::NotFound(msg),
            RepositoryError::Conflict(msg) => DomainError::Conflict(msg),
            RepositoryError::Backend(msg) => DomainError::Transport(msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker connection error: {0}")]
    Connection(String),
    #[error("broker publish failed: {0}")]
    Publish(String),
    #[error("broker consume failed: {0}")]
    Consume(String),
    #[error("broker acknowledgement failed: {0}")]
    Ack(String),
}

impl From<BrokerError> for DomainError {
    fn from(err: BrokerError) -> Self {
        DomainError::Transport(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("LLM upstream error: {0}")]
    Upstream(String),
    #[error("LLM transport error: {0}")]
    Transport(String),
}

impl From<LlmError> for DomainError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout(_) => DomainError::Timeout(err.to_string()),
            LlmError::Upstream(msg) => DomainError::GenerationFailed(msg),
            LlmError::Transport(msg) => DomainError::Transport(msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum PromptTemplateError {
    #[error("prompt template {0} not found")]
    NotFound(String),
    #[error("prompt template {0} unreadable: {1}")]
    Unreadable(String, String),
}

impl From<PromptTemplateError> for DomainError {
    fn from(err: PromptTemplateError) -> Self {
        DomainError::GenerationFailed(format!("prompt_preparation: {err}"))
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error("rate limit exceeded: {0} active generations for user")]
    RateLimited(i64),
    #[error("aggregate already has a live generation task")]
    AlreadyGenerating,
}

impl From<DispatchError> for DomainError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Repository(e) => e.into(),
            DispatchError::Broker(e) => e.into(),
            DispatchError::RateLimited(n) => {
                DomainError::Conflict(format!("{n} active generations already in flight"))
            }
            DispatchError::AlreadyGenerating => {
                DomainError::Conflict("aggregate already has a live generation task".to_string())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ReaperError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<ReaperError> for DomainError {
    fn from(err: ReaperError) -> Self {
        match err {
            ReaperError::Repository(e) => e.into(),
        }
    }
}
