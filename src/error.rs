//! Error taxonomy for the client flow and the server-side verifier.

use thiserror::Error;

/// Client-side failures. None of these are retriable without fixing the
/// input; the flow is restarted and nothing is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("invalid identity secret: {0}")]
    InvalidSecret(String),

    #[error("identity commitment is not a member of the group")]
    NotAMember,

    #[error("group of {len} members exceeds tree capacity of {capacity} leaves")]
    TreeOverflow { len: usize, capacity: usize },

    #[error("malformed witness: {0}")]
    MalformedWitness(String),

    #[error("prover failure: {0}")]
    ProverFailure(String),

    #[error("invalid scope: {0}")]
    InvalidScope(String),

    #[error("proof generation was cancelled")]
    Cancelled,

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
}

/// Reasons the verifier refuses a submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The proof was built against a root outside the accepted window.
    #[error("proof root is stale or unknown; refetch the group and rebuild the proof")]
    StaleOrUnknownRoot,

    #[error("proof failed verification")]
    InvalidProof,

    #[error("nullifier has already been used in this scope")]
    DuplicateNullifier,

    #[error("scope '{0}' is not accepted by this verifier")]
    ScopeNotAllowed(String),

    #[error("malformed submission: {0}")]
    MalformedSubmission(String),

    #[error("nullifier registry failure: {0}")]
    Registry(String),

    /// The verifier itself failed before reaching a verdict.
    #[error("internal verifier error: {0}")]
    Internal(String),
}

impl Rejection {
    /// Stable machine-readable code used in response bodies and logs.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::StaleOrUnknownRoot => "stale_or_unknown_root",
            Self::InvalidProof => "invalid_proof",
            Self::DuplicateNullifier => "duplicate_nullifier",
            Self::ScopeNotAllowed(_) => "scope_not_allowed",
            Self::MalformedSubmission(_) => "malformed_submission",
            Self::Registry(_) => "registry_failure",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Only a stale root can be fixed by rebuilding the proof and resubmitting.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::StaleOrUnknownRoot)
    }
}

impl From<ProtocolError> for Rejection {
    fn from(err: ProtocolError) -> Self {
        Self::MalformedSubmission(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stale_root_is_retriable() {
        assert!(Rejection::StaleOrUnknownRoot.is_retriable());
        assert!(!Rejection::InvalidProof.is_retriable());
        assert!(!Rejection::DuplicateNullifier.is_retriable());
        assert!(!Rejection::Registry("io".into()).is_retriable());
        assert!(!Rejection::Internal("panic".into()).is_retriable());
    }

    #[test]
    fn protocol_errors_map_to_malformed_submissions() {
        let rejection = Rejection::from(ProtocolError::InvalidEncoding("bad hex".into()));
        assert_eq!(rejection.code(), "malformed_submission");
        assert!(rejection.to_string().contains("bad hex"));
    }
}
