use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use woodlink_core::WoodlinkError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(WoodlinkError::Validation(msg.into()).into())
    }
}

pub(crate) fn status_for(err: &WoodlinkError) -> StatusCode {
    match err {
        WoodlinkError::Validation(_) | WoodlinkError::IdentityMismatch { .. } => {
            StatusCode::BAD_REQUEST
        }
        WoodlinkError::ClaimNotFound(_)
        | WoodlinkError::ItemNotFound(_)
        | WoodlinkError::WorkshopNotFound(_)
        | WoodlinkError::UserNotFound(_)
        | WoodlinkError::ReviewNotFound(_) => StatusCode::NOT_FOUND,
        WoodlinkError::ItemUnavailable(_) => StatusCode::GONE,
        WoodlinkError::InvalidTransition { .. } => StatusCode::CONFLICT,
        WoodlinkError::StoreUnavailable(_)
        | WoodlinkError::Io(_)
        | WoodlinkError::Yaml(_)
        | WoodlinkError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self
            .0
            .downcast_ref::<WoodlinkError>()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
