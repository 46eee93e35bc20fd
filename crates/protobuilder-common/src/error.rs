use thiserror::Error;

/// Failure reported by a [`crate::ContainerEngine`] call.
///
/// The daemon client's own error type stays inside the engine
/// implementation; callers only see the operation and the message.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{operation} failed: {message}")]
    Daemon {
        operation: &'static str,
        message: String,
    },

    #[error("No such container or image: {0}")]
    NotFound(String),
}

impl EngineError {
    pub fn daemon(operation: &'static str, message: impl std::fmt::Display) -> Self {
        EngineError::Daemon {
            operation,
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}
