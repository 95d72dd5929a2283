//! HTTP mapping for the shared error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use vitrine_auth::AuthError;
use vitrine_catalog::CatalogError;
use vitrine_core::ApiError;
use vitrine_store::StoreError;

/// Response-convertible wrapper around [`ApiError`].
#[derive(Debug)]
pub struct AppError(pub ApiError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.0.is_server_error() {
            tracing::error!(category = %self.0.category(), error = %self.0, "request failed");
        } else {
            tracing::debug!(category = %self.0.category(), error = %self.0, "request rejected");
        }

        let body = json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        // The internal reason is logged; the response message is uniform.
        tracing::debug!(reason = %err, "credential rejected");
        Self(ApiError::auth(err.public_message()))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let mapped = match &err {
            StoreError::Timeout => ApiError::UpstreamTimeout,
            StoreError::NotConfigured { message } => ApiError::not_configured(message.clone()),
            StoreError::InvalidInput { message } => ApiError::validation(message.clone()),
            _ => ApiError::upstream(err.status(), err.to_string()),
        };
        Self(mapped)
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Store(store_err) => store_err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_share_public_message() {
        let a = AppError::from(AuthError::SignatureMismatch);
        let b = AppError::from(AuthError::Expired);
        assert_eq!(a.0.to_string(), b.0.to_string());
        assert_eq!(a.0.status_code(), 401);
    }

    #[test]
    fn test_store_error_mapping() {
        assert_eq!(AppError::from(StoreError::Timeout).0.status_code(), 504);
        assert_eq!(
            AppError::from(StoreError::http(500, "boom")).0.status_code(),
            502
        );
        assert_eq!(
            AppError::from(StoreError::not_configured("no url"))
                .0
                .status_code(),
            503
        );
        assert_eq!(
            AppError::from(StoreError::invalid_input("bad id"))
                .0
                .status_code(),
            400
        );
    }
}
