//! Error types for the rollgate control plane

use thiserror::Error;

use crate::lifecycle::fsm::DeploymentStatus;

/// Main error type for the control plane
#[derive(Error, Debug)]
pub enum ControlError {
    /// A referenced environment or deployment does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The record store could not complete a query
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A persisted administrative record holds an impossible value
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: DeploymentStatus,
        to: DeploymentStatus,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Whether the whole operation may succeed if attempted again later
    pub fn is_retryable(&self) -> bool {
        matches!(self, ControlError::StoreUnavailable(_))
    }
}
