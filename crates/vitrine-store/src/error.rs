use thiserror::Error;

/// Errors from the upstream record store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No store URL configured; product data is unavailable.
    #[error("Record store is not configured: {message}")]
    NotConfigured { message: String },

    /// The store answered with a non-success HTTP status.
    #[error("Record store error {status}: {message}")]
    Http { status: u16, message: String },

    /// The request did not complete within the bounded timeout.
    #[error("Record store request timed out")]
    Timeout,

    /// Transport-level failure (connect, TLS, proxy).
    #[error("Record store request failed: {message}")]
    Request { message: String },

    /// The store answered with a body we could not decode.
    #[error("Failed to decode record store response: {message}")]
    Decode { message: String },

    /// The caller supplied input we refuse to put into a query.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl StoreError {
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::NotConfigured {
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// HTTP status of the upstream answer, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Rate-limiting class of failure (403/429) that drives facet backoff.
    pub fn is_throttled(&self) -> bool {
        matches!(self.status(), Some(403) | Some(429))
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if err.is_decode() {
            return Self::Decode {
                message: err.to_string(),
            };
        }
        Self::Request {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttled_statuses() {
        assert!(StoreError::http(403, "forbidden").is_throttled());
        assert!(StoreError::http(429, "too many").is_throttled());
        assert!(!StoreError::http(500, "boom").is_throttled());
        assert!(!StoreError::Timeout.is_throttled());
    }

    #[test]
    fn test_status_accessor() {
        assert_eq!(StoreError::http(404, "missing").status(), Some(404));
        assert!(StoreError::http(404, "missing").is_not_found());
        assert_eq!(StoreError::Timeout.status(), None);
    }

    #[test]
    fn test_display() {
        let err = StoreError::http(502, "bad gateway");
        assert_eq!(err.to_string(), "Record store error 502: bad gateway");
    }
}
