use thiserror::Error;

/// Error taxonomy shared across the Vitrine services.
///
/// Every variant maps to exactly one HTTP status; the mapping lives here so
/// handlers never invent their own.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service not configured: {0}")]
    NotConfigured(String),

    #[error("Upstream error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("Upstream timeout")]
    UpstreamTimeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::NotConfigured(message.into())
    }

    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Auth(_) => 401,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::NotConfigured(_) => 503,
            Self::Upstream { .. } => 502,
            Self::UpstreamTimeout => 504,
            Self::Internal(_) => 500,
        }
    }

    /// Check if this error is a client error (4xx category)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this error is a server error (5xx category)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Auth(_) => ErrorCategory::Auth,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Conflict(_) => ErrorCategory::Conflict,
            Self::NotConfigured(_) => ErrorCategory::Configuration,
            Self::Upstream { .. } => ErrorCategory::Upstream,
            Self::UpstreamTimeout => ErrorCategory::Timeout,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Auth,
    NotFound,
    Conflict,
    Upstream,
    Timeout,
    Configuration,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Auth => write!(f, "auth"),
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Upstream => write!(f, "upstream"),
            Self::Timeout => write!(f, "timeout"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Convenience result type for Vitrine operations
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::validation("bad page").status_code(), 400);
        assert_eq!(ApiError::auth("bad hash").status_code(), 401);
        assert_eq!(ApiError::not_found("product p1").status_code(), 404);
        assert_eq!(ApiError::conflict("resubmission").status_code(), 409);
        assert_eq!(ApiError::not_configured("no bot token").status_code(), 503);
        assert_eq!(ApiError::upstream(Some(500), "boom").status_code(), 502);
        assert_eq!(ApiError::UpstreamTimeout.status_code(), 504);
        assert_eq!(ApiError::internal("oops").status_code(), 500);
    }

    #[test]
    fn test_client_vs_server_classification() {
        assert!(ApiError::validation("x").is_client_error());
        assert!(ApiError::conflict("x").is_client_error());
        assert!(!ApiError::validation("x").is_server_error());

        assert!(ApiError::upstream(None, "x").is_server_error());
        assert!(ApiError::UpstreamTimeout.is_server_error());
        assert!(!ApiError::UpstreamTimeout.is_client_error());
    }

    #[test]
    fn test_upstream_message_includes_status() {
        let err = ApiError::upstream(Some(429), "throttled");
        assert_eq!(err.to_string(), "Upstream error (429): throttled");

        let err = ApiError::upstream(None, "connection reset");
        assert_eq!(err.to_string(), "Upstream error: connection reset");
    }

    #[test]
    fn test_categories() {
        assert_eq!(ApiError::auth("x").category(), ErrorCategory::Auth);
        assert_eq!(
            ApiError::upstream(Some(502), "x").category(),
            ErrorCategory::Upstream
        );
        assert_eq!(
            ApiError::UpstreamTimeout.category(),
            ErrorCategory::Timeout
        );
        assert_eq!(ErrorCategory::NotFound.to_string(), "not_found");
        assert_eq!(ErrorCategory::Timeout.to_string(), "timeout");
    }
}
