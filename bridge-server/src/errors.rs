use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct ApiError {
    /// Short machine-readable message, rendered as `error`
    pub error: String,
    /// Optional human-readable detail, rendered as `error_description`
    pub description: Option<String>,
    pub status_code: StatusCode,
}

impl ApiError {
    /// Create a new ApiError with a message and status code
    pub fn new<S: ToString>(error: S, status_code: StatusCode) -> Self {
        Self {
            error: error.to_string(),
            description: None,
            status_code,
        }
    }

    /// Attach an `error_description`
    pub fn with_description<S: ToString>(mut self, description: S) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Create new Internal Server Error (500) with a message
    pub fn internal<S: ToString>(error: S) -> Self {
        Self::new(error, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Create new Bad Request Error (400) with a message
    pub fn bad_request<S: ToString>(error: S) -> Self {
        Self::new(error, StatusCode::BAD_REQUEST)
    }

    /// Create new Unauthorized Error (401) with a message
    pub fn unauthorized<S: ToString>(error: S) -> Self {
        Self::new(error, StatusCode::UNAUTHORIZED)
    }

    /// Create new Forbidden Error (403) with a message
    pub fn forbidden<S: ToString>(error: S) -> Self {
        Self::new(error, StatusCode::FORBIDDEN)
    }

    /// Create new Not Found Error (404) with a message
    pub fn not_found<S: ToString>(error: S) -> Self {
        Self::new(error, StatusCode::NOT_FOUND)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code;
        let body = match self.description {
            Some(description) => json!({
                "error": self.error,
                "error_description": description,
            }),
            None => json!({
                "error": self.error,
            }),
        };
        (status_code, Json(body)).into_response()
    }
}
