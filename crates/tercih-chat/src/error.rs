//! Error types for the dialogue engine.

use tercih_core::error::TercihError;

/// Errors from the dialogue engine.
///
/// None of these reach transport callers: `DialogueOrchestrator::process_turn`
/// converts them into the fallback envelope.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("internal fault: {0}")]
    Internal(String),
    #[error("render error: {0}")]
    Render(String),
    #[error("catalog error: {0}")]
    Catalog(String),
}

impl From<TercihError> for ChatError {
    fn from(err: TercihError) -> Self {
        match err {
            TercihError::Catalog(msg) => ChatError::Catalog(msg),
            other => ChatError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::InvalidInput("empty session id".to_string());
        assert_eq!(err.to_string(), "invalid input: empty session id");

        let err = ChatError::SessionNotFound("s-1".to_string());
        assert_eq!(err.to_string(), "session not found: s-1");

        let err = ChatError::Internal("lock poisoned".to_string());
        assert_eq!(err.to_string(), "internal fault: lock poisoned");

        let err = ChatError::Render("missing template".to_string());
        assert_eq!(err.to_string(), "render error: missing template");

        let err = ChatError::Catalog("bad snapshot".to_string());
        assert_eq!(err.to_string(), "catalog error: bad snapshot");
    }

    #[test]
    fn test_chat_error_from_catalog_error() {
        let err: ChatError = TercihError::Catalog("no items".to_string()).into();
        assert!(matches!(err, ChatError::Catalog(_)));
        assert!(err.to_string().contains("no items"));
    }

    #[test]
    fn test_chat_error_from_other_tercih_error() {
        let err: ChatError = TercihError::Config("broken".to_string()).into();
        assert!(matches!(err, ChatError::Internal(_)));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_chat_error_unicode_inner_messages() {
        let err = ChatError::InvalidInput("geçersiz oturum: ğüşıöç".to_string());
        assert!(err.to_string().contains("ğüşıöç"));
    }
}
