//! Authentication error types.

use std::sync::Arc;
use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// OTP dispatch was rejected by the server
    #[error("OTP request failed: {0}")]
    OtpRequest(String),

    /// A resend was attempted inside the client-side cooldown window
    #[error("OTP resend available in {remaining_secs}s")]
    OtpCooldown { remaining_secs: u64 },

    /// Wrong or expired code; the pending challenge remains usable
    #[error("OTP verification failed: {0}")]
    OtpVerify(String),

    /// Refresh token missing, rejected, or expired; terminal for the session
    #[error("Session expired")]
    SessionExpired,

    /// Bearer token payload could not be parsed; treated as no session
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Operation requires a session and none exists
    #[error("Not signed in")]
    NotSignedIn,

    /// A coalesced refresh shared among concurrent callers failed
    #[error("Token refresh failed: {0}")]
    RefreshFailed(Arc<AuthError>),

    /// Unexpected non-success API response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns true if the caller can simply retry the same flow.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::OtpRequest(_) | AuthError::OtpCooldown { .. } | AuthError::OtpVerify(_)
        )
    }

    /// Returns true if the current session is unusable and must be discarded.
    pub fn is_terminal(&self) -> bool {
        match self {
            AuthError::SessionExpired => true,
            AuthError::RefreshFailed(inner) => inner.is_terminal(),
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
