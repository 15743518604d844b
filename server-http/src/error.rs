use crate::api::ErrorResponse;
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use shared::Error;
use tracing::{error, warn};

/// A store failure on its way out as an HTTP response.
///
/// `action` is the generic message callers see for backend failures; the
/// underlying cause is only logged.
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    action: &'static str,
    status: Option<StatusCode>,
}

impl ApiError {
    pub fn new(error: Error, action: &'static str) -> Self {
        Self {
            error,
            action,
            status: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(Error::InvalidInput(message.into()), "Invalid request")
    }

    /// A body that couldn't be read keeps its own status (413 when over the
    /// limit); anything else wrong with the JSON is a 400
    pub fn from_rejection(rejection: JsonRejection) -> Self {
        let status = match &rejection {
            JsonRejection::BytesRejection(_) => Some(rejection.status()),
            _ => None,
        };
        Self {
            status,
            ..Self::bad_request(rejection.body_text())
        }
    }

    pub fn status(&self) -> StatusCode {
        if let Some(status) = self.status {
            return status;
        }
        match self.error {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::BackendUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self.error {
            Error::InvalidInput(message) => {
                warn!("{}: {}", self.action, message);
                message
            }
            Error::NotFound => "Share not found or expired".to_string(),
            Error::BackendUnavailable(cause) => {
                error!("{}: {}", self.action, cause);
                self.action.to_string()
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

/// Attach the caller-facing action to a store result
pub trait StoreResultExt<T> {
    fn or_api_error(self, action: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreResultExt<T> for shared::Result<T> {
    fn or_api_error(self, action: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::new(e, action))
    }
}
