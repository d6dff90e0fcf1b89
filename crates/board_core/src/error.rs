use thiserror::Error;

/// Failure taxonomy at the mutation boundary. `Validation` is rejected
/// before any network call; the other variants settle an in-flight
/// mutation and trigger rollback.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("server rejected request ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("unexpected {content_type} response ({status}): {snippet}")]
    UnexpectedResponse {
        status: u16,
        content_type: String,
        snippet: String,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl BoardError {
    /// The message shown in user-facing notifications: the server-provided
    /// error where one exists, a generic message otherwise.
    pub fn user_message(&self) -> String {
        match self {
            BoardError::Validation(message) => message.clone(),
            BoardError::Api { message, .. } => message.clone(),
            BoardError::UnexpectedResponse { .. } => {
                "the server returned an unexpected response".to_string()
            }
            BoardError::Transport(_) => "a network error occurred".to_string(),
        }
    }
}
