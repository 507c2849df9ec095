//! Controller Error Types
//!
//! Any error returned from a tick means the state document was not
//! written; the next tick resumes from the last persisted phase.
//! - `Service`: unexpected collaborator failure (auth, throttling, ...)
//! - `InvariantViolation`: the topology contradicts the phase; requires an
//!   operator
//! - `ForbiddenTransition`: the engine computed an edge outside the phase
//!   graph

use thiserror::Error;

use crate::config::ConfigError;
use crate::service::ServiceError;
use crate::state::Phase;
use crate::store::StoreError;

/// Result type for controller operations
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Controller errors
#[derive(Debug, Clone, Error)]
pub enum ControllerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("{operation} failed: {source}")]
    Service {
        operation: String,
        #[source]
        source: ServiceError,
    },

    #[error("Invariant violated in {phase}: {message}")]
    InvariantViolation { phase: Phase, message: String },

    #[error("Forbidden transition: {from} -> {to}")]
    ForbiddenTransition { from: Phase, to: Phase },
}

impl ControllerError {
    /// Wrap a collaborator error with the operation that produced it.
    pub fn service(operation: impl Into<String>) -> impl FnOnce(ServiceError) -> Self {
        let operation = operation.into();
        move |source| Self::Service { operation, source }
    }

    pub fn invariant(phase: Phase, message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            phase,
            message: message.into(),
        }
    }

    /// Whether the error signals a topology the controller cannot reason
    /// about without an operator.
    pub fn requires_operator(&self) -> bool {
        matches!(
            self,
            Self::InvariantViolation { .. } | Self::ForbiddenTransition { .. } | Self::Store(StoreError::Corrupt(_))
        )
    }
}
