//! Error taxonomy for repository operations
//!
//! Transport failures are raw; everything above the error translator sees
//! [`FedoraError`].

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, FedoraError>;

/// Raw failure reported by a transport adapter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP {status} at {target}: {body}")]
    Status {
        status: u16,
        target: String,
        body: String,
    },

    #[error("Connection failure at {target}: {message}")]
    Connection { target: String, message: String },

    #[error("Malformed response from {target}: {message}")]
    Malformed { target: String, message: String },
}

impl TransportError {
    /// HTTP status code, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Request target the failure refers to
    pub fn target(&self) -> &str {
        match self {
            TransportError::Status { target, .. }
            | TransportError::Connection { target, .. }
            | TransportError::Malformed { target, .. } => target,
        }
    }
}

/// Typed repository errors
#[derive(Debug, thiserror::Error)]
pub enum FedoraError {
    /// The addressed object or datastream does not exist remotely
    #[error("Not found: {}", .0.target())]
    NotFound(TransportError),

    /// Credentials were rejected
    #[error("Unauthorized at {}", .0.target())]
    Unauthorized(TransportError),

    /// Any other transport or server-side failure
    #[error("Invalid request at {target}")]
    InvalidRequest {
        target: String,
        #[source]
        source: TransportError,
    },

    /// A setter received an out-of-domain value
    #[error("{0}")]
    Validation(String),

    /// Attempt to write to a memoized profile or a historical view
    #[error("Read-only: {0}")]
    ImmutableWrite(String),

    /// Some calls of a best-effort batch failed
    #[error("{} of the requested operations failed", .failures.len())]
    Partial { failures: Vec<FedoraError> },
}

impl FedoraError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FedoraError::NotFound(_))
    }

    pub(crate) fn malformed(target: &str, message: impl ToString) -> Self {
        FedoraError::InvalidRequest {
            target: target.to_string(),
            source: TransportError::Malformed {
                target: target.to_string(),
                message: message.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_invalid_request_keeps_cause() {
        let cause = TransportError::Status {
            status: 500,
            target: "objects/x".to_string(),
            body: "boom".to_string(),
        };
        let err = FedoraError::InvalidRequest {
            target: "objects/x".to_string(),
            source: cause.clone(),
        };

        let source = err.source().unwrap().downcast_ref::<TransportError>().unwrap();
        assert_eq!(source, &cause);
        assert_eq!(source.status(), Some(500));
    }

    #[test]
    fn test_display_names_target() {
        let err = FedoraError::Unauthorized(TransportError::Status {
            status: 401,
            target: "objects/a:1".to_string(),
            body: String::new(),
        });
        assert_eq!(err.to_string(), "Unauthorized at objects/a:1");
    }
}
