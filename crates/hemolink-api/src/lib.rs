use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// -------------------------
// Rate limit headers
// -------------------------

pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

// -------------------------
// Error body
// -------------------------

/// JSON error body shared by every error response:
/// `{error, detail, timestamp}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            error: error.into(),
            detail,
            timestamp: now_rfc3339(),
        }
    }
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

/// High-level API errors mapped to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Too many requests: {0}")]
    TooManyRequests(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn too_many_requests(msg: impl Into<String>) -> Self {
        Self::TooManyRequests(msg.into())
    }
    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-facing label for the `error` field.
    pub fn label(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::TooManyRequests(_) => "rate_limited",
            ApiError::ServiceUnavailable(_) => "unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let detail = match self {
            ApiError::BadRequest(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::TooManyRequests(m)
            | ApiError::ServiceUnavailable(m)
            | ApiError::Internal(m) => m.clone(),
        };
        ErrorBody::new(self.label(), Some(detail))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match serde_json::to_vec(&self.to_body()) {
            Ok(b) => b,
            Err(_) => b"{\"error\":\"internal_error\"}".to_vec(),
        };

        let builder = axum::http::Response::builder().status(status).header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        builder
            .body(axum::body::Body::from(body))
            .unwrap_or_else(|_| {
                axum::http::Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .header(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("application/json"),
                    )
                    .body(axum::body::Body::from("{}"))
                    .expect("build fallback response")
            })
    }
}

// -------------------------
// Response wrapper
// -------------------------

#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub value: T,
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl<T> ApiResponse<T> {
    pub fn new(value: T, status: StatusCode) -> Self {
        Self {
            value,
            status,
            headers: Vec::new(),
        }
    }

    pub fn ok(value: T) -> Self {
        Self::new(value, StatusCode::OK)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = match serde_json::to_vec(&self.value) {
            Ok(b) => b,
            Err(_) => b"{\"error\":\"internal_error\"}".to_vec(),
        };
        let mut builder = axum::http::Response::builder().status(self.status).header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        for (name, value) in self.headers.into_iter() {
            builder = builder.header(name, value);
        }
        builder
            .body(axum::body::Body::from(body))
            .unwrap_or_else(|_| {
                axum::http::Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .header(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static("application/json"),
                    )
                    .body(axum::body::Body::from("{}"))
                    .expect("build fallback response")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn into_response_sets_status_and_content_type() {
        let resp = ApiError::bad_request("Invalid parameter").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, &HeaderValue::from_static("application/json"));
    }

    #[test]
    fn error_body_shape() {
        let body = ApiError::not_found("sync log abc not found").to_body();
        assert_eq!(body.error, "not_found");
        assert_eq!(body.detail.as_deref(), Some("sync log abc not found"));
        assert!(!body.timestamp.is_empty());

        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("error").is_some());
        assert!(value.get("detail").is_some());
        assert!(value.get("timestamp").is_some());
    }

    #[test]
    fn api_error_variants_map_to_status() {
        let cases: Vec<(ApiError, StatusCode, &str)> = vec![
            (
                ApiError::bad_request("x"),
                StatusCode::BAD_REQUEST,
                "bad_request",
            ),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND, "not_found"),
            (ApiError::conflict("x"), StatusCode::CONFLICT, "conflict"),
            (
                ApiError::too_many_requests("x"),
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
            ),
            (
                ApiError::service_unavailable("x"),
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
            ),
            (
                ApiError::internal("x"),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
            ),
        ];
        for (err, status, label) in cases.into_iter() {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.label(), label);
        }
    }

    #[test]
    fn api_response_ok_sets_status_and_content_type() {
        let payload = json!({"status": "completed"});
        let resp = ApiResponse::ok(payload).into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            &HeaderValue::from_static("application/json")
        );
    }

    #[test]
    fn api_response_can_add_headers() {
        let payload = json!({"status": "started"});
        let resp = ApiResponse::ok(payload)
            .with_header(
                HeaderName::from_static(RATE_LIMIT_LIMIT),
                HeaderValue::from_static("5"),
            )
            .into_response();
        assert_eq!(
            resp.headers().get(RATE_LIMIT_LIMIT).unwrap(),
            &HeaderValue::from_static("5")
        );
    }
}
