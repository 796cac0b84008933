//! Feed and post endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::Uri,
};
use quill_common::AppError;
use quill_core::{CommentInput, ImageChange, PostView};
use quill_db::entities::{group, user};

use crate::{
    cache::PageCache,
    extractors::{AuthUser, MaybeAuthUser, PageParam},
    forms::{FormErrors, NON_FIELD, PostForm},
    middleware::AppState,
    pages::{FormMode, post_url, render},
    response::{PageResult, page, see_other},
};

/// Site-wide feed, served from the page cache when possible.
pub async fn index(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    PageParam(page_number): PageParam,
    uri: Uri,
) -> PageResult {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let key = PageCache::key(path_and_query, viewer.as_ref().map(|v| v.id.as_str()));

    if let Some(html) = state.page_cache.get(&key).await {
        return Ok(page(html.to_string()));
    }

    let feed = state.post_service.index_feed(page_number.as_deref()).await?;
    let html: Arc<str> = Arc::from(render!(posts::index_html(
        &state.ctx(viewer.as_ref()),
        &feed
    ))?);
    state.page_cache.insert(key, Arc::clone(&html)).await;

    Ok(page(html.to_string()))
}

/// Posts tagged with a group.
pub async fn group_posts(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    PageParam(page_number): PageParam,
    Path(slug): Path<String>,
) -> PageResult {
    let group = state.group_service.get_by_slug(&slug).await?;
    let feed = state
        .post_service
        .group_feed(&group.id, page_number.as_deref())
        .await?;

    let base_path = format!("/group/{}/", group.slug);

    Ok(page(render!(posts::group_html(
        &state.ctx(viewer.as_ref()),
        &group,
        &base_path,
        &feed
    ))?))
}

/// Posts by the authors the viewer follows.
pub async fn follow_index(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    PageParam(page_number): PageParam,
) -> PageResult {
    let feed = state
        .post_service
        .follow_feed(&viewer.id, page_number.as_deref())
        .await?;

    Ok(page(render!(posts::follow_html(
        &state.ctx(Some(&viewer)),
        &feed
    ))?))
}

/// Empty post form.
pub async fn new_post_form(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
) -> PageResult {
    let groups = state.group_service.list().await?;

    Ok(page(render!(posts::form_html(
        &state.ctx(Some(&viewer)),
        &FormMode::New,
        &groups,
        &PostForm::default(),
        &FormErrors::new()
    ))?))
}

/// Publish a post.
pub async fn new_post(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    form: PostForm,
) -> PageResult {
    let groups = state.group_service.list().await?;
    let mut errors = form.validate(&groups);

    if errors.is_empty() {
        match create_post(&state, &viewer, &form).await {
            Ok(()) => return Ok(see_other("/")),
            Err(AppError::Validation(msg)) => errors.add(NON_FIELD, msg),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(page(render!(posts::form_html(
        &state.ctx(Some(&viewer)),
        &FormMode::New,
        &groups,
        &form,
        &errors
    ))?))
}

async fn create_post(
    state: &AppState,
    viewer: &user::Model,
    form: &PostForm,
) -> Result<(), AppError> {
    let image = match &form.image {
        Some(upload) => Some(
            state
                .media_service
                .store_post_image(&viewer.id, &upload.data)
                .await?,
        ),
        None => None,
    };

    let stored = image.clone();
    if let Err(e) = state
        .post_service
        .create(&viewer.id, form.input(), image)
        .await
    {
        if let Some(key) = stored {
            discard_image(state, &key).await;
        }
        return Err(e);
    }
    Ok(())
}

/// Remove an image that no saved post refers to.
async fn discard_image(state: &AppState, key: &str) {
    if let Err(e) = state.media_service.remove(key).await {
        tracing::warn!(error = %e, key = %key, "Failed to remove unused image");
    }
}

/// A post, its comments and the comment form.
pub async fn post_view(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path((username, post_id)): Path<(String, String)>,
) -> PageResult {
    let view = state.post_service.get_for_author(&username, &post_id).await?;
    render_detail(
        &state,
        viewer.as_ref(),
        &view,
        &CommentInput::default(),
        &FormErrors::new(),
    )
    .await
}

/// Render the detail page, optionally with a rejected comment.
pub(super) async fn render_detail(
    state: &AppState,
    viewer: Option<&user::Model>,
    view: &PostView,
    comment: &CommentInput,
    errors: &FormErrors,
) -> PageResult {
    let posts_count = state.post_service.count_by_author(&view.author.id).await?;
    let comments = state.comment_service.list_for_post(&view.post.id).await?;
    let title = format!("Post by {}", view.author.display_name());
    let post_path = post_url(&view.author.username, &view.post.id);

    Ok(page(render!(posts::detail_html(
        &state.ctx(viewer),
        &title,
        view,
        &post_path,
        posts_count,
        &comments,
        comment,
        errors
    ))?))
}

/// Pre-filled edit form. Only the author may edit.
pub async fn post_edit_form(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path((username, post_id)): Path<(String, String)>,
) -> PageResult {
    let view = state.post_service.get_for_author(&username, &post_id).await?;
    let post_path = post_url(&view.author.username, &view.post.id);

    if view.author.id != viewer.id {
        return Ok(see_other(&post_path));
    }

    let groups = state.group_service.list().await?;
    let values = PostForm {
        text: view.post.text.clone(),
        group: view.post.group_id.clone(),
        ..PostForm::default()
    };

    render_edit_form(
        &state,
        &viewer,
        &view,
        &post_path,
        &groups,
        &values,
        &FormErrors::new(),
    )
}

/// Save an edit. Only the author may edit.
pub async fn post_edit(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path((username, post_id)): Path<(String, String)>,
    form: PostForm,
) -> PageResult {
    let view = state.post_service.get_for_author(&username, &post_id).await?;
    let post_path = post_url(&view.author.username, &view.post.id);

    if view.author.id != viewer.id {
        tracing::debug!(post_id = %post_id, user_id = %viewer.id, "Edit by non-author ignored");
        return Ok(see_other(&post_path));
    }

    let groups = state.group_service.list().await?;
    let mut errors = form.validate(&groups);

    if errors.is_empty() {
        match save_edit(&state, &viewer, &view, &form).await {
            Ok(()) => return Ok(see_other(&post_path)),
            Err(AppError::Validation(msg)) => errors.add(NON_FIELD, msg),
            Err(e) => return Err(e.into()),
        }
    }

    render_edit_form(&state, &viewer, &view, &post_path, &groups, &form, &errors)
}

async fn save_edit(
    state: &AppState,
    viewer: &user::Model,
    view: &PostView,
    form: &PostForm,
) -> Result<(), AppError> {
    let change = match (&form.image, form.clear_image) {
        (Some(upload), _) => ImageChange::Replace(
            state
                .media_service
                .store_post_image(&viewer.id, &upload.data)
                .await?,
        ),
        (None, true) => ImageChange::Clear,
        (None, false) => ImageChange::Keep,
    };
    let old_image = view.post.image.clone();
    let replaced = change != ImageChange::Keep;
    let stored = match &change {
        ImageChange::Replace(key) => Some(key.clone()),
        ImageChange::Keep | ImageChange::Clear => None,
    };

    if let Err(e) = state
        .post_service
        .update(&viewer.id, view.post.clone(), form.input(), change)
        .await
    {
        if let Some(key) = stored {
            discard_image(state, &key).await;
        }
        return Err(e);
    }

    if replaced && let Some(key) = old_image {
        discard_image(state, &key).await;
    }

    Ok(())
}

fn render_edit_form(
    state: &AppState,
    viewer: &user::Model,
    view: &PostView,
    post_path: &str,
    groups: &[group::Model],
    values: &PostForm,
    errors: &FormErrors,
) -> PageResult {
    let current_image = view
        .post
        .image
        .as_deref()
        .map(|key| state.media_service.public_url(key));
    let mode = FormMode::Edit {
        post_path,
        current_image: current_image.as_deref(),
    };

    Ok(page(render!(posts::form_html(
        &state.ctx(Some(viewer)),
        &mode,
        groups,
        values,
        errors
    ))?))
}
