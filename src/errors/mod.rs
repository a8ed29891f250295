use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the execution host core.
///
/// Every variant maps to a response category via [`Error::status_code`];
/// `CacheDegraded` is the one kind that is always recovered locally (treated
/// as a cache miss and logged) and never aborts an invocation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("deployment {0} not found")]
    NotFound(Uuid),

    #[error("invalid runtime type: {0}")]
    InvalidRuntimeKind(String),

    #[error("malformed response envelope: {0}")]
    MalformedEnvelope(#[from] prost::DecodeError),

    #[error("module compilation failed: {0}")]
    CompilationFailed(String),

    #[error("instantiation failed: {0}")]
    InstantiationFailed(String),

    #[error("missing _start function")]
    MissingEntryPoint,

    #[error("execution error: {0}")]
    GuestExecutionError(String),

    #[error("sandbox I/O failure: {0}")]
    SandboxIOFailure(#[source] std::io::Error),

    #[error("artifact unavailable at {key}: {reason}")]
    ArtifactUnavailable { key: String, reason: String },

    #[error("cache degraded: {0}")]
    CacheDegraded(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// HTTP status category the external router should surface for this kind.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::InvalidRuntimeKind(_) => 400,
            Error::InvalidConfig(_) => 400,
            Error::MalformedEnvelope(_)
            | Error::CompilationFailed(_)
            | Error::InstantiationFailed(_)
            | Error::MissingEntryPoint
            | Error::GuestExecutionError(_)
            | Error::SandboxIOFailure(_)
            | Error::ArtifactUnavailable { .. }
            | Error::CacheDegraded(_) => 500,
        }
    }

    /// Helper for object-store misses and read failures.
    pub fn artifact(key: impl Into<String>, reason: impl ToString) -> Self {
        Error::ArtifactUnavailable {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience constructor for channel failures carrying a path for context.
pub fn sandbox_io(path: &Path, err: std::io::Error) -> Error {
    tracing::debug!(path = %path.display(), "sandbox channel I/O failed");
    Error::SandboxIOFailure(err)
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_response_categories() {
        assert_eq!(Error::NotFound(Uuid::nil()).status_code(), 404);
        assert_eq!(Error::InvalidRuntimeKind("py".into()).status_code(), 400);
        assert_eq!(Error::MissingEntryPoint.status_code(), 500);
        assert_eq!(
            Error::GuestExecutionError("trap".into()).status_code(),
            500
        );
        assert_eq!(Error::CacheDegraded("redis gone".into()).status_code(), 500);
    }
}
