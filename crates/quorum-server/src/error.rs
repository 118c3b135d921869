//! HTTP mapping for the error taxonomy.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use quorum_core::Error;
use serde_json::json;
use tracing::error;

/// Newtype so `?` works in handlers while the taxonomy stays in
/// `quorum-core`.
pub struct ApiError(pub Error);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl<E: Into<Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            Error::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                Json(json!({
                    "error": "Too many requests. Please try again later.",
                    "retry_after": retry_after_secs,
                })),
            )
                .into_response(),
            Error::NotFound(what) => {
                (StatusCode::NOT_FOUND, error_body(format!("{what} not found"))).into_response()
            }
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, error_body(msg)).into_response(),
            Error::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                error_body("Invalid or missing API key".into()),
            )
                .into_response(),
            Error::Unconfigured(what) => (
                StatusCode::SERVICE_UNAVAILABLE,
                error_body(format!("{what} is not configured")),
            )
                .into_response(),
            // Upstream detail goes to the log, not to the client.
            err => {
                error!(%err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("Internal server error".into()),
                )
                    .into_response()
            }
        }
    }
}

fn error_body(message: String) -> Json<serde_json::Value> {
    Json(json!({ "error": message }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let response = ApiError(Error::RateLimited {
            retry_after_secs: 60,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    }

    #[test]
    fn test_upstream_detail_hidden() {
        let response = ApiError(Error::Upstream("supabase: connection refused".into()))
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::NotFound("event".into()), StatusCode::NOT_FOUND),
            (Error::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (Error::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                Error::Unconfigured("Eventbrite".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }
}
