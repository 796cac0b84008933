//! Profile and follow endpoints.

use axum::extract::{Path, State};
use quill_core::FollowResult;

use crate::{
    extractors::{AuthUser, MaybeAuthUser, PageParam},
    middleware::AppState,
    pages::render,
    response::{PageResult, page, see_other},
};

/// An author's profile and posts.
pub async fn profile(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    PageParam(page_number): PageParam,
    Path(username): Path<String>,
) -> PageResult {
    let profile = state
        .user_service
        .profile(&username, viewer.as_ref().map(|v| v.id.as_str()))
        .await?;
    let feed = state
        .post_service
        .profile_feed(&profile.author.id, page_number.as_deref())
        .await?;

    let base_path = format!("/{}/", profile.author.username);

    Ok(page(render!(profile::profile_html(
        &state.ctx(viewer.as_ref()),
        &profile,
        &base_path,
        &feed
    ))?))
}

/// Follow an author, then go back to their profile.
pub async fn profile_follow(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(username): Path<String>,
) -> PageResult {
    let author = state.user_service.get_by_username(&username).await?;

    let result = state.follow_service.follow(&viewer.id, &author.id).await?;
    if result != FollowResult::Followed {
        tracing::debug!(
            user_id = %viewer.id,
            author_id = %author.id,
            ?result,
            "Follow was a no-op"
        );
    }

    Ok(see_other(&format!("/{}/", author.username)))
}

/// Stop following an author, then go back to their profile.
pub async fn profile_unfollow(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(username): Path<String>,
) -> PageResult {
    let author = state.user_service.get_by_username(&username).await?;

    state.follow_service.unfollow(&viewer.id, &author.id).await?;

    Ok(see_other(&format!("/{}/", author.username)))
}
