//! State Store Error Types
//!
//! A document that exists but cannot be understood is never replaced by a
//! default: resetting to `steady/primary` while the secondary is the real
//! writer would start a second failover.

use thiserror::Error;

use crate::service::ServiceError;

/// Result type for state store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// State store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Parameter store call failed: {0}")]
    Service(#[from] ServiceError),

    #[error("Persisted state is corrupt: {0}")]
    Corrupt(String),

    #[error("Failed to serialize state: {0}")]
    Serialize(String),
}

impl StoreError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}
