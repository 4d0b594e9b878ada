//! Error taxonomy for document sessions
//!
//! Every failure a session can surface maps onto an [`ErrorKind`] and can be
//! rendered as a short, human-readable message for the user interface.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable classification of a [`SessionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedMediaType,
    EmptyDocument,
    InvalidState,
    OperationInProgress,
    InvalidQuestion,
    NetworkUnavailable,
    ProviderError,
    MalformedProviderResponse,
    PromptTooLarge,
    StaleResponseDiscarded,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedMediaType => "unsupported_media_type",
            Self::EmptyDocument => "empty_document",
            Self::InvalidState => "invalid_state",
            Self::OperationInProgress => "operation_in_progress",
            Self::InvalidQuestion => "invalid_question",
            Self::NetworkUnavailable => "network_unavailable",
            Self::ProviderError => "provider_error",
            Self::MalformedProviderResponse => "malformed_provider_response",
            Self::PromptTooLarge => "prompt_too_large",
            Self::StaleResponseDiscarded => "stale_response_discarded",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the session state machine and the provider clients
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionError {
    #[error("unsupported media type '{media_type}'")]
    UnsupportedMediaType { media_type: String },

    #[error("document '{name}' is empty")]
    EmptyDocument { name: String },

    #[error("{reason}")]
    InvalidState { reason: String },

    #[error("another request is already in flight")]
    OperationInProgress,

    #[error("question is empty")]
    InvalidQuestion,

    #[error("network unavailable: {message}")]
    NetworkUnavailable { message: String },

    /// Non-success status, a timeout once connected, or a refused prompt;
    /// `status` is `None` unless the provider answered with an error status
    #[error("provider error: {message}")]
    ProviderError { status: Option<u16>, message: String },

    #[error("malformed provider response: {message}")]
    MalformedProviderResponse { message: String },

    #[error("prompt is {size} characters, provider accepts at most {limit}")]
    PromptTooLarge { size: usize, limit: usize },

    #[error("stale response discarded")]
    StaleResponseDiscarded,
}

impl SessionError {
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedMediaType { .. } => ErrorKind::UnsupportedMediaType,
            Self::EmptyDocument { .. } => ErrorKind::EmptyDocument,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::OperationInProgress => ErrorKind::OperationInProgress,
            Self::InvalidQuestion => ErrorKind::InvalidQuestion,
            Self::NetworkUnavailable { .. } => ErrorKind::NetworkUnavailable,
            Self::ProviderError { .. } => ErrorKind::ProviderError,
            Self::MalformedProviderResponse { .. } => ErrorKind::MalformedProviderResponse,
            Self::PromptTooLarge { .. } => ErrorKind::PromptTooLarge,
            Self::StaleResponseDiscarded => ErrorKind::StaleResponseDiscarded,
        }
    }

    /// Caller-input errors: rejected before any state transition
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMediaType { .. }
                | Self::EmptyDocument { .. }
                | Self::InvalidState { .. }
                | Self::OperationInProgress
                | Self::InvalidQuestion
                | Self::PromptTooLarge { .. }
        )
    }

    /// Stale responses are suppressed from the UI and only logged
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::StaleResponseDiscarded)
    }

    /// Short message for display next to the error kind
    pub fn user_message(&self) -> String {
        match self {
            Self::UnsupportedMediaType { media_type } => format!(
                "Files of type '{}' are not supported. Please choose an image or a PDF.",
                media_type
            ),
            Self::EmptyDocument { name } => format!("'{}' is empty. Please choose another file.", name),
            Self::InvalidState { reason } => format!("That action is not available right now: {}.", reason),
            Self::OperationInProgress => "Please wait for the current request to finish.".to_string(),
            Self::InvalidQuestion => "Please enter a question.".to_string(),
            Self::NetworkUnavailable { .. } => {
                "Could not reach the service. Check your connection and try again.".to_string()
            }
            Self::ProviderError { status: Some(status), message } => {
                format!("The service returned an error ({}): {}", status, message)
            }
            Self::ProviderError { status: None, message } => {
                format!("The service did not return an answer: {}", message)
            }
            Self::MalformedProviderResponse { .. } => {
                "The service returned a response that could not be read.".to_string()
            }
            Self::PromptTooLarge { .. } => {
                "The document text is too long to ask follow-up questions about.".to_string()
            }
            Self::StaleResponseDiscarded => "A response for a previous document was ignored.".to_string(),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised while assembling client configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {name}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(SessionError::InvalidQuestion.kind(), ErrorKind::InvalidQuestion);
        assert_eq!(
            SessionError::ProviderError { status: Some(502), message: "bad gateway".into() }.kind(),
            ErrorKind::ProviderError
        );
        assert_eq!(
            SessionError::PromptTooLarge { size: 10, limit: 5 }.kind(),
            ErrorKind::PromptTooLarge
        );
    }

    #[test]
    fn test_stale_response_is_not_user_facing() {
        assert!(!SessionError::StaleResponseDiscarded.is_user_facing());
        assert!(SessionError::OperationInProgress.is_user_facing());
        assert!(SessionError::NetworkUnavailable { message: "refused".into() }.is_user_facing());
    }

    #[test]
    fn test_validation_classification() {
        assert!(SessionError::InvalidQuestion.is_validation());
        assert!(SessionError::OperationInProgress.is_validation());
        assert!(SessionError::invalid_state("no document selected").is_validation());
        assert!(!SessionError::MalformedProviderResponse { message: "x".into() }.is_validation());
        assert!(!SessionError::StaleResponseDiscarded.is_validation());
    }

    #[test]
    fn test_user_message_includes_provider_status() {
        let err = SessionError::ProviderError {
            status: Some(500),
            message: "Internal Server Error".into(),
        };
        let message = err.user_message();
        assert!(message.contains("500"));
        assert!(message.contains("Internal Server Error"));
    }

    #[test]
    fn test_error_serializes_with_kind_tag() {
        let json = serde_json::to_value(SessionError::PromptTooLarge { size: 40, limit: 30 }).unwrap();
        assert_eq!(json["kind"], "prompt_too_large");
        assert_eq!(json["limit"], 30);

        let json = serde_json::to_value(SessionError::OperationInProgress).unwrap();
        assert_eq!(json["kind"], "operation_in_progress");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::MalformedProviderResponse.to_string(), "malformed_provider_response");
    }
}
