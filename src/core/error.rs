//! Error taxonomy for the orchestration core.

use http::StatusCode;
use thiserror::Error;

use crate::constants::{MALFORMED_RESPONSE_MESSAGE, NETWORK_ERROR_MESSAGE};
use crate::state::{Phase, PollGeneration};

/// Client-side checks that block an action before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Select an image first")]
    MissingImage,
    #[error("No stylized image to build a 3D model from")]
    MissingTransformResult,
}

/// Failures surfaced by the remote job client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),
    /// The server answered with an explicit error.
    #[error("Server rejected the request ({status}): {message}")]
    RemoteRejected { status: StatusCode, message: String },
    /// 2xx with a body that could not be parsed.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ClientError {
    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        ClientError::RemoteRejected {
            status,
            message: message.into(),
        }
    }

    /// Text shown to the user. Server messages are passed through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(err) => err.to_string(),
            ClientError::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
            ClientError::RemoteRejected { message, .. } => message.clone(),
            ClientError::MalformedResponse(_) => MALFORMED_RESPONSE_MESSAGE.to_string(),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }
}

/// A transition the workflow state refused to apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{action} is not allowed while {phase:?}")]
    InvalidPhase { phase: Phase, action: &'static str },
    #[error("result for {received} dropped, current loop is {current}")]
    StaleGeneration {
        received: PollGeneration,
        current: PollGeneration,
    },
    #[error("result for a superseded transform job dropped")]
    StaleTransform,
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_message_is_verbatim() {
        let err = ClientError::rejected(StatusCode::BAD_REQUEST, "Image must be less than 10MB");
        assert_eq!(err.user_message(), "Image must be less than 10MB");
    }

    #[test]
    fn test_network_and_malformed_use_generic_messages() {
        let network = ClientError::Network("connection refused".to_string());
        assert!(network.is_network());
        assert_eq!(network.user_message(), NETWORK_ERROR_MESSAGE);

        let malformed = ClientError::MalformedResponse("expected value at line 1".to_string());
        assert_eq!(malformed.user_message(), MALFORMED_RESPONSE_MESSAGE);
    }

    #[test]
    fn test_validation_message_is_shown_as_is() {
        let err: ClientError = ValidationError::MissingImage.into();
        assert!(!err.is_network());
        assert_eq!(err.user_message(), "Select an image first");
    }
}
