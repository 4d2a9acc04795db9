//! HTTP boundary
//!
//! Every master operation is reachable as one route under
//! `/:documentType/...`; see [`routes::router`]. Domain errors cross the
//! boundary as `{error, code}` bodies.

pub mod dto;
pub mod routes;

pub use routes::router;

use crate::core::MasterError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum WebError {
    Master(MasterError),
    Input(String),
}

impl From<MasterError> for WebError {
    fn from(err: MasterError) -> Self {
        WebError::Master(err)
    }
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::Master(MasterError::NotFound(_)) => StatusCode::NOT_FOUND,
            WebError::Master(MasterError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            WebError::Master(_) | WebError::Input(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, code) = match self {
            WebError::Master(MasterError::NotFound(msg)) => (msg, "not_found"),
            WebError::Master(MasterError::Unavailable(msg)) => (msg, "unavailable"),
            WebError::Master(err) => (err.to_string(), "bad_request"),
            WebError::Input(msg) => (msg, "bad_request"),
        };

        if status.is_server_error() {
            log::error!("request failed with {}: {}", status, message);
        }

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;

#[cfg(test)]
mod tests {
    use super::WebError;
    use crate::core::MasterError;
    use axum::http::StatusCode;

    #[test]
    fn master_errors_map_to_status_codes() {
        let cases = [
            (MasterError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (MasterError::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (MasterError::DuplicateKey("x".into()), StatusCode::BAD_REQUEST),
            (MasterError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (MasterError::ConcurrentModification("x".into()), StatusCode::BAD_REQUEST),
            (MasterError::UnknownKind("x".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(WebError::from(err).status(), status);
        }
    }
}
