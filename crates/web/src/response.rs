//! Page responses and errors.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use quill_common::AppError;

/// Result type for page handlers.
pub type PageResult<T = Response> = Result<T, PageError>;

/// Marker left on error responses for the error page middleware.
#[derive(Debug, Clone)]
pub struct ErrorPage {
    /// Response status.
    pub status: StatusCode,
    /// Message safe to show to the client.
    pub message: String,
}

/// An error rendered as an HTML error page.
#[derive(Debug)]
pub struct PageError(pub AppError);

impl PageError {
    /// 404 for an unmatched path.
    #[must_use]
    pub fn not_found(path: &str) -> Self {
        Self(AppError::NotFound(path.to_string()))
    }
}

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let code = self.0.error_code();

        let message = if self.0.is_server_error() {
            tracing::error!(code = %code, error = %self.0, "Request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(code = %code, error = %self.0, "Client error");
            self.0.to_string()
        };

        let mut response = (status, Html(format!("<h1>{status}</h1>"))).into_response();
        response
            .extensions_mut()
            .insert(ErrorPage { status, message });
        response
    }
}

/// `303 See Other` to `location`.
#[must_use]
pub fn see_other(location: &str) -> Response {
    Redirect::to(location).into_response()
}

/// Render a full HTML page with status 200.
#[must_use]
pub fn page(html: String) -> Response {
    Html(html).into_response()
}
