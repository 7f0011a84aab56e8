use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

use crate::backend::BackendError;
use crate::upload::UploadError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    /// No session: send the visitor to the login page.
    #[error("Login required")]
    LoginRequired,

    /// Signed in, but the invitation code has not been redeemed yet.
    #[error("Activation pending")]
    ActivationPending,

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::LoginRequired | AppError::ActivationPending => {
                return Redirect::to("/login").into_response();
            }
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Upload(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Backend(BackendError::NotFound) => {
                (StatusCode::NOT_FOUND, "Not found".to_string())
            }
            AppError::Backend(BackendError::Unauthorized) => {
                (StatusCode::FORBIDDEN, "Forbidden".to_string())
            }
            AppError::Backend(e) => {
                tracing::error!("Backend error: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "The photo service is unavailable, please try again".to_string(),
                )
            }
            AppError::Multipart(e) => (StatusCode::BAD_REQUEST, e.body_text()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn response_status(err: AppError) -> StatusCode {
        let response = err.into_response();
        response.status()
    }

    #[test]
    fn not_found_returns_404() {
        assert_eq!(response_status(AppError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            response_status(AppError::Backend(BackendError::NotFound)),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn login_required_redirects_to_login() {
        let response = AppError::LoginRequired.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn activation_pending_redirects_to_login() {
        let response = AppError::ActivationPending.into_response();
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn bad_request_returns_400() {
        assert_eq!(
            response_status(AppError::BadRequest("oops".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            response_status(AppError::Upload(UploadError::NotAnImage)),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn backend_failures_map_to_gateway_or_forbidden() {
        assert_eq!(
            response_status(AppError::Backend(BackendError::Unauthorized)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            response_status(AppError::Backend(BackendError::Status {
                status: 500,
                message: "x".into()
            })),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_returns_500() {
        assert_eq!(
            response_status(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
