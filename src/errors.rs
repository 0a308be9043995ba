use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed for {service}: {message}")]
    Auth { service: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error talking to {service}: {message}")]
    Network { service: String, message: String },

    #[error("Local I/O error: {0}")]
    LocalIo(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

impl AppError {
    pub fn auth(service: &str, message: impl Into<String>) -> Self {
        AppError::Auth {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub fn network(service: &str, message: impl Into<String>) -> Self {
        AppError::Network {
            service: service.to_string(),
            message: message.into(),
        }
    }

    /// Errors that only void the current photo; everything else ends the run.
    pub fn is_item_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Network { .. } | AppError::LocalIo(_) | AppError::Json(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(AppError::network("yandex", "boom").is_item_recoverable());
        assert!(AppError::LocalIo(std::io::Error::other("disk full")).is_item_recoverable());
        assert!(!AppError::auth("vk", "expired").is_item_recoverable());
        assert!(!AppError::NotFound("album 7".into()).is_item_recoverable());
        assert!(!AppError::Cancelled("ctrl-c".into()).is_item_recoverable());
        assert!(!AppError::Config("bad".into()).is_item_recoverable());
    }

    #[test]
    fn test_display_names_service() {
        let err = AppError::auth("Google Drive", "HTTP 401");
        assert_eq!(
            err.to_string(),
            "Authentication failed for Google Drive: HTTP 401"
        );
    }
}
