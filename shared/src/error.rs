//! Error type shared by every backend call.

use thiserror::Error;

/// Failure of a call against the admin backend.
///
/// Both controllers store this in their state instead of propagating it, so a
/// screen can render it without extra plumbing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Response status code.
        status: u16,
        /// `message` field of the response body, or the status reason.
        message: String,
    },
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),
    /// The response body did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// A refresh response carried no access token.
    #[error("refresh response did not contain an access token")]
    MissingToken,
    /// The request was superseded or aborted before it finished.
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// Cancellation is not a failure and must never reach the user.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// Status code for HTTP failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http {
                status, ..
            } => Some(*status),
            _ => None,
        }
    }

    /// 401 and 403 mean the session is no longer usable.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}
