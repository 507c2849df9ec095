//! Collaborator Plumbing
//!
//! Shared types for every external collaborator the controller talks to
//! (database control plane, DNS, health signal, parameter store):
//! - A single error shape carrying the vendor error code
//! - Classification of the codes the controller treats as soft outcomes
//! - The boxed future type used by the async collaborator traits

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by collaborator trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type for collaborator calls
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Classified collaborator error kinds.
///
/// Only `Other` is ever propagated as a tick failure without inspection;
/// the remaining kinds are folded into wait/already-done outcomes by the
/// call sites that expect them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// The referenced resource does not exist
    NotFound,

    /// A resource with the requested identifier already exists
    AlreadyExists,

    /// The resource is not in a state that permits the operation
    InvalidState,

    /// Anything else: auth, throttling, malformed response, transport
    Other,
}

impl ServiceErrorKind {
    /// Classify a vendor error code.
    pub fn classify(code: &str) -> Self {
        match code {
            "DBInstanceNotFound"
            | "DBInstanceNotFoundFault"
            | "ParameterNotFound"
            | "NoSuchHealthCheck"
            | "NotFound" => Self::NotFound,
            "DBInstanceAlreadyExists" | "DBInstanceAlreadyExistsFault" | "AlreadyExists" => {
                Self::AlreadyExists
            }
            "InvalidDBInstanceState" | "InvalidDBInstanceStateFault" | "InvalidState" => {
                Self::InvalidState
            }
            _ => Self::Other,
        }
    }

    /// Get the kind name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::InvalidState => "invalid_state",
            Self::Other => "other",
        }
    }
}

/// Collaborator error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// Classified kind
    pub kind: ServiceErrorKind,
    /// Raw vendor error code
    pub code: String,
    /// Error message
    pub message: String,
}

impl ServiceError {
    /// Create an error from a raw vendor code, classifying it.
    pub fn from_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            kind: ServiceErrorKind::classify(&code),
            code,
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::from_code("NotFound", message)
    }

    /// Create an already-exists error.
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::from_code("AlreadyExists", message)
    }

    /// Create an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::from_code("InvalidState", message)
    }

    /// Create an unclassified error with an explicit code.
    pub fn other(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ServiceErrorKind::Other,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ServiceErrorKind::NotFound
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind == ServiceErrorKind::AlreadyExists
    }

    pub fn is_invalid_state(&self) -> bool {
        self.kind == ServiceErrorKind::InvalidState
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_vendor_codes() {
        assert_eq!(
            ServiceErrorKind::classify("DBInstanceNotFoundFault"),
            ServiceErrorKind::NotFound
        );
        assert_eq!(
            ServiceErrorKind::classify("DBInstanceAlreadyExists"),
            ServiceErrorKind::AlreadyExists
        );
        assert_eq!(
            ServiceErrorKind::classify("InvalidDBInstanceStateFault"),
            ServiceErrorKind::InvalidState
        );
        assert_eq!(
            ServiceErrorKind::classify("ThrottlingException"),
            ServiceErrorKind::Other
        );
    }

    #[test]
    fn test_other_keeps_raw_code() {
        let err = ServiceError::other("AccessDenied", "no");
        assert_eq!(err.kind, ServiceErrorKind::Other);
        assert!(format!("{}", err).contains("AccessDenied"));
    }
}
