//! Error taxonomy (§7): a classification every service-level error maps
//! into via [`DomainError::kind`], used to decide propagation policy
//! (surface vs. flip-to-error vs. retry) rather than to replace the
//! concrete per-port error enums in `application::ports`.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    GenerationFailed,
    ParseFailed,
    Transport,
    Timeout,
    Stuck,
    Internal,
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("failed to parse model output: {0}")]
    ParseFailed(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("row stuck in generating status: {0}")]
    Stuck(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::GenerationFailed(_) => ErrorKind::GenerationFailed,
            Self::ParseFailed(_) => ErrorKind::ParseFailed,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Stuck(_) => ErrorKind::Stuck,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// §7: "`generation_failed` and `parse_failed` flip the owning
    /// aggregate to `error`". `Stuck` is included since it is the
    /// reaper's own terminal verdict for a row.
    pub fn flips_aggregate_to_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::GenerationFailed | ErrorKind::ParseFailed | ErrorKind::Stuck
        )
    }

    /// §7: "validation/not_found/conflict are surfaced to HTTP callers;
    /// never cause aggregate status changes."
    pub fn is_caller_facing(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::NotFound | ErrorKind::Conflict
        )
    }

    /// §7: "transport/timeout are retried at the transport layer... ;
    /// persistent failures degrade to stuck."
    pub fn is_retryable_at_transport(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_and_parse_failures_flip_aggregate() {
        assert!(DomainError::GenerationFailed("x".into()).flips_aggregate_to_error());
        assert!(DomainError::ParseFailed("x".into()).flips_aggregate_to_error());
        assert!(!DomainError::Validation("x".into()).flips_aggregate_to_error());
    }

    #[test]
    fn caller_facing_kinds_never_touch_aggregate_status() {
        for e in [
            DomainError::Validation("x".into()),
            DomainError::NotFound("x".into()),
            DomainError::Conflict("x".into()),
        ] {
            assert!(e.is_caller_facing());
            assert!(!e.flips_aggregate_to_error());
        }
    }

    #[test]
    fn transport_and_timeout_are_transport_retryable() {
        assert!(DomainError::Transport("x".into()).is_retryable_at_transport());
        assert!(DomainError::Timeout("x".into()).is_retryable_at_transport());
        assert!(!DomainError::Internal("x".into()).is_retryable_at_transport());
    }
}
