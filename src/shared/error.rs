use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    AuthenticationRequired,
    NotFound(String),
    TransientStore(String),
    ValidationError(String),
    ConfigurationError(String),
    SerializationError(String),
    Internal(String),
}

impl AppError {
    /// 楽観的更新を巻き戻すべき失敗かどうか
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::TransientStore(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::AuthenticationRequired => write!(f, "Authentication required"),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::TransientStore(msg) => write!(f, "Store error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::TransientStore(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::TransientStore(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlx_errors_are_transient() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(err.is_transient());
        assert!(err.to_string().starts_with("Store error:"));
    }

    #[test]
    fn authentication_required_is_not_transient() {
        assert!(!AppError::AuthenticationRequired.is_transient());
        assert_eq!(
            AppError::AuthenticationRequired.to_string(),
            "Authentication required"
        );
    }
}
