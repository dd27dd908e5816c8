//! Error taxonomy for session transitions.
//!
//! Every provider failure is converted into a [`SessionError`] at the
//! manager boundary; nothing here is fatal.

use thiserror::Error;

use crate::blockchain::ethereum::ProviderRpcError;

/// Custom error type for session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No compatible external provider is registered or reachable.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The operator declined a connection or switch request.
    #[error("User rejected the request: {0}")]
    UserRejected(String),

    /// The provider does not know the requested chain.
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    /// Any other provider-reported failure.
    #[error("Provider error: {0}")]
    TransientFailure(String),

    /// Another mutating operation is already in flight.
    #[error("Session busy: {0}")]
    Busy(String),

    /// Operation preconditions do not hold for the current session.
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Unknown or unusable provider kind.
    #[error("Invalid wallet type: {0}")]
    InvalidProvider(String),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Failures worth retrying without operator involvement.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::TransientFailure(_) | SessionError::Busy(_))
    }

    /// Failures caused by the operator rather than the provider.
    pub fn is_user_action(&self) -> bool {
        matches!(self, SessionError::UserRejected(_))
    }
}

impl From<ProviderRpcError> for SessionError {
    fn from(err: ProviderRpcError) -> Self {
        match err.code {
            ProviderRpcError::USER_REJECTED => SessionError::UserRejected(err.message),
            ProviderRpcError::UNRECOGNIZED_CHAIN => SessionError::UnknownNetwork(err.message),
            _ => SessionError::TransientFailure(err.to_string()),
        }
    }
}

impl From<toml::de::Error> for SessionError {
    fn from(err: toml::de::Error) -> Self {
        SessionError::Config(err.to_string())
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Config(err.to_string())
    }
}
