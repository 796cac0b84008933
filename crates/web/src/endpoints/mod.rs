//! Page endpoints.

mod auth;
mod comments;
mod posts;
mod profile;

use std::any::Any;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Uri,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::get,
};
use quill_common::AppError;
use tower_http::{catch_panic::CatchPanicLayer, services::ServeDir};

use crate::{
    middleware::{AppState, auth_middleware, error_pages},
    response::PageError,
};

/// Create the site router.
///
/// Static path segments take priority over captures, so `/new/`, `/follow/`,
/// `/group/...` and `/auth/...` are never read as usernames.
pub fn router(state: AppState) -> Router {
    let storage = &state.config.storage;

    let mut router = Router::new()
        .route("/", get(posts::index))
        .route("/group/{slug}/", get(posts::group_posts))
        .route("/new/", get(posts::new_post_form).post(posts::new_post))
        .route("/follow/", get(posts::follow_index))
        .merge(auth::router())
        .route("/{username}/", get(profile::profile))
        .route("/{username}/follow/", get(profile::profile_follow))
        .route("/{username}/unfollow/", get(profile::profile_unfollow))
        .route("/{username}/{post_id}/", get(posts::post_view))
        .route(
            "/{username}/{post_id}/edit/",
            get(posts::post_edit_form).post(posts::post_edit),
        )
        .route(
            "/{username}/{post_id}/comment/",
            get(comments::add_comment_redirect).post(comments::add_comment),
        );

    let media_path = storage.base_url.trim_end_matches('/');
    if media_path.starts_with('/') && media_path.len() > 1 {
        router = router.nest_service(media_path, ServeDir::new(&storage.base_path));
    }

    apply_layers(router, state)
}

/// Error pages, sessions and the body limit around `routes`.
fn apply_layers(routes: Router<AppState>, state: AppState) -> Router {
    let max_upload_bytes = state.config.server.max_upload_bytes;

    routes
        .fallback(page_not_found)
        .layer(CatchPanicLayer::custom(server_error))
        .layer(from_fn_with_state(state.clone(), error_pages))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Fallback for unmatched routes.
async fn page_not_found(uri: Uri) -> PageError {
    PageError::not_found(uri.path())
}

/// Turn a handler panic into the server error page.
fn server_error(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(ToString::to_string))
        .unwrap_or_else(|| "unknown panic".to_string());

    PageError(AppError::Internal(format!("Handler panicked: {detail}"))).into_response()
}
