use payflow_core::envelope;
use thiserror::Error;

/// Failures crossing the backend boundary, classified the way the views react
/// to them: an authentication failure tears the session down globally, the rest
/// surface inline next to the action that caused them.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication required: {message}")]
    Unauthenticated { message: String },
    #[error("not allowed: {message}")]
    PermissionDenied { message: String },
    #[error("invalid input: {message}")]
    Validation { message: String },
    #[error("conflicting update: {message}")]
    Conflict { message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("backend failure ({status}): {message}")]
    Upstream { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Classify a non-success response, extracting the user-facing message from
    /// the normalized error envelope.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = envelope::extract_message(body);
        match status {
            401 => Self::Unauthenticated { message },
            403 => Self::PermissionDenied { message },
            404 => Self::NotFound { message },
            409 => Self::Conflict { message },
            400 | 422 => Self::Validation { message },
            status => Self::Upstream { status, message },
        }
    }

    /// True when the credential itself is invalid and the session must be torn
    /// down, regardless of which call tripped it.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Self::Unauthenticated { message }
            | Self::PermissionDenied { message }
            | Self::Validation { message }
            | Self::Conflict { message }
            | Self::NotFound { message }
            | Self::Upstream { message, .. } => message.clone(),
            Self::Transport(error) => error.to_string(),
            Self::Decode(message) => message.clone(),
        }
    }
}
