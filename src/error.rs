//! Errors surfaced to HTTP clients

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Empty or malformed request; the message goes back verbatim.
    #[error("{0}")]
    BadRequest(String),

    /// Anything that went wrong while handling a well-formed request.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    /// 4xx
    pub fn is_client_error(&self) -> bool {
        matches!(self, ApiError::BadRequest(_))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::BadRequest(msg) => (status, msg).into_response(),
            ApiError::Internal(err) => {
                let problem = json!({
                    "title": "An error occurred while processing your request.",
                    "status": status.as_u16(),
                    "detail": format!("{err:#}"),
                });
                (
                    status,
                    [(header::CONTENT_TYPE, "application/problem+json")],
                    problem.to_string(),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_error_classification() {
        assert!(ApiError::bad_request("Empty body").is_client_error());
        assert!(!ApiError::from(anyhow!("disk full")).is_client_error());
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(anyhow!("x")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_problem_response() {
        let err = ApiError::from(anyhow!("permission denied").context("create Backups/x"));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "application/problem+json"
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ApiError::bad_request("No files uploaded.").to_string(), "No files uploaded.");
        let err = ApiError::from(anyhow!("boom"));
        assert_eq!(err.to_string(), "boom");
    }
}
