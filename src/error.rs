// Error types for fetching, caching and the proxy HTTP surface
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use thiserror::Error;

/// Errors from fetching a document over HTTP
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Unsuccessful status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        if err.is_timeout() {
            FetchError::Timeout(url)
        } else if let Some(status) = err.status() {
            FetchError::Status { url, status: status.as_u16() }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for FetchError {
    fn from(err: url::ParseError) -> Self {
        FetchError::InvalidUrl(err.to_string())
    }
}

/// Errors from the persistent cache store
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid cache name: {0}")]
    InvalidName(String),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// HTTP error returned by the proxy surface
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    InvalidJson(String),

    // 502 Bad Gateway (upstream unreachable)
    BadGateway(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::BadGateway(_) => 502,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::InvalidJson(msg) => msg,
            ApiError::BadGateway(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code()
        })
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }
}

// Real navigations that fail upstream surface as gateway errors
impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidUrl(msg) => ApiError::bad_request(format!("Invalid URL: {}", msg)),
            FetchError::Timeout(url) => {
                tracing::error!("Upstream timeout: {}", url);
                ApiError::bad_gateway("Upstream timed out")
            }
            FetchError::Status { url, status } => {
                tracing::error!("Upstream returned {} for {}", status, url);
                ApiError::bad_gateway("Upstream returned an error")
            }
            FetchError::Network(msg) => {
                tracing::error!("Upstream unreachable: {}", msg);
                ApiError::bad_gateway("Upstream unreachable")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_map_to_bad_gateway() {
        let err: ApiError = FetchError::Network("connection refused".into()).into();
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.error_code(), "BAD_GATEWAY");

        let err: ApiError = FetchError::InvalidUrl("relative URL without a base".into()).into();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn json_body_carries_code() {
        let body = ApiError::invalid_json("expected `type` field").to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "INVALID_JSON");
    }
}
