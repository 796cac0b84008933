//! Comment endpoints.

use axum::extract::{Path, State};
use quill_core::CommentInput;

use super::posts::render_detail;
use crate::{
    extractors::{AuthUser, PageForm},
    forms::validate_comment,
    middleware::AppState,
    pages::post_url,
    response::{PageResult, see_other},
};

/// Comments are only accepted by POST; a GET goes back to the post.
pub async fn add_comment_redirect(
    State(state): State<AppState>,
    AuthUser(_viewer): AuthUser,
    Path((username, post_id)): Path<(String, String)>,
) -> PageResult {
    let view = state.post_service.get_for_author(&username, &post_id).await?;
    Ok(see_other(&post_url(&view.author.username, &view.post.id)))
}

/// Attach a comment to a post.
pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path((username, post_id)): Path<(String, String)>,
    PageForm(input): PageForm<CommentInput>,
) -> PageResult {
    let view = state.post_service.get_for_author(&username, &post_id).await?;

    let errors = validate_comment(&input);
    if !errors.is_empty() {
        return render_detail(&state, Some(&viewer), &view, &input, &errors).await;
    }

    state
        .comment_service
        .create(&view.post.id, &viewer.id, input)
        .await?;

    Ok(see_other(&post_url(&view.author.username, &view.post.id)))
}
