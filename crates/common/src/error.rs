//! Error types for nvmeof-bridge

use thiserror::Error;

/// Result type alias using the bridge Error
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed request, or the storage target rejected the operation
    #[error("{0}")]
    InvalidArgument(String),

    #[error("unable to find {kind} {id}")]
    NotFound { kind: String, id: String },

    /// A locally held record the storage target no longer reports
    #[error("Could not find {kind}: {id}")]
    OutOfSync { kind: String, id: String },

    #[error("{0} method is not implemented")]
    Unimplemented(String),

    /// The backend call itself failed to execute
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Transport-agnostic classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    Unimplemented,
    Internal,
}

impl Error {
    pub fn not_found(kind: &str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.to_string(),
            id: id.into(),
        }
    }

    pub fn out_of_sync(kind: &str, id: impl Into<String>) -> Self {
        Error::OutOfSync {
            kind: kind.to_string(),
            id: id.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidArgument(_) | Error::OutOfSync { .. } => ErrorCode::InvalidArgument,
            Error::NotFound { .. } => ErrorCode::NotFound,
            Error::Unimplemented(_) => ErrorCode::Unimplemented,
            _ => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_names_identifier() {
        let err = Error::not_found("subsystem", "subsys-0");
        assert_eq!(err.to_string(), "unable to find subsystem subsys-0");
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err = Error::out_of_sync("NQN", "nqn.2022-09.io.spdk:opi1");
        assert_eq!(err.to_string(), "Could not find NQN: nqn.2022-09.io.spdk:opi1");
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_transport_failures_are_internal() {
        assert_eq!(Error::Rpc("broken pipe".into()).code(), ErrorCode::Internal);
        assert_eq!(
            Error::InvalidConfig("bad".into()).code(),
            ErrorCode::Internal
        );
        assert_eq!(
            Error::Unimplemented("UpdateNvmeSubsystem".into()).code(),
            ErrorCode::Unimplemented
        );
    }
}
