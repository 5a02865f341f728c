use thiserror::Error;

/// Domain error taxonomy. The surrounding request layer maps these onto its
/// own status codes; the core only cares about the kind.
///
/// Immediate operations report exactly one error per call, checked in a
/// fixed order: existence before permission before content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The acting user id does not resolve to a registered user. Session
    /// validation proper lives outside the core; this is the backstop.
    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),

    /// Authenticated but lacking the required relationship to the target
    /// (not a member, not an owner, not the creator, not the initiator).
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// The target id does not resolve to a live entity.
    #[error("not found: {0}")]
    NotFound(&'static str),

    /// Input violates a stated bound (message length, pagination start,
    /// duplicate react, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Store I/O failure while persisting a mutation.
    #[error("internal: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;
