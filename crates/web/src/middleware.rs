//! Web middleware and shared state.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use quill_common::{Config, StorageBackend};
use quill_core::{
    CommentService, FollowService, GroupService, MediaService, PostService, UserService,
};
use quill_db::{
    entities::user,
    repositories::{
        CommentRepository, FollowRepository, GroupRepository, PostRepository, UserRepository,
    },
};
use sea_orm::DatabaseConnection;

use crate::{
    cache::PageCache,
    pages::{Ctx, render},
    response::ErrorPage,
};

/// Name of the session cookie.
pub const TOKEN_COOKIE: &str = "token";

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub post_service: PostService,
    pub group_service: GroupService,
    pub comment_service: CommentService,
    pub follow_service: FollowService,
    pub media_service: MediaService,
    pub page_cache: PageCache,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire repositories and services over one connection pool.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        storage: Arc<dyn StorageBackend>,
        config: Config,
    ) -> Self {
        let user_repo = UserRepository::new(Arc::clone(&db));
        let post_repo = PostRepository::new(Arc::clone(&db));
        let group_repo = GroupRepository::new(Arc::clone(&db));
        let comment_repo = CommentRepository::new(Arc::clone(&db));
        let follow_repo = FollowRepository::new(db);

        Self {
            user_service: UserService::new(
                user_repo.clone(),
                post_repo.clone(),
                follow_repo.clone(),
            ),
            post_service: PostService::new(
                post_repo,
                user_repo.clone(),
                group_repo.clone(),
                follow_repo.clone(),
            ),
            group_service: GroupService::new(group_repo),
            comment_service: CommentService::new(comment_repo, user_repo),
            follow_service: FollowService::new(follow_repo),
            media_service: MediaService::new(storage),
            page_cache: PageCache::new(&config.cache),
            config: Arc::new(config),
        }
    }

    /// Template context for a request.
    #[must_use]
    pub fn ctx<'a>(&'a self, viewer: Option<&'a user::Model>) -> Ctx<'a> {
        Ctx {
            site_name: &self.config.site.name,
            viewer,
            media: &self.media_service,
        }
    }
}

/// Authentication middleware.
///
/// Resolves the session cookie (or a bearer token) to a user and stores the
/// user in the request extensions for the extractors.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = CookieJar::from_headers(req.headers())
        .get(TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| {
            req.headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(ToString::to_string)
        });

    if let Some(token) = token {
        match state.user_service.authenticate_by_token(&token).await {
            Ok(Some(user)) => {
                req.extensions_mut().insert(user);
            }
            Ok(None) => tracing::debug!("Ignoring unknown session token"),
            Err(e) => tracing::warn!(error = %e, "Failed to resolve session token"),
        }
    }

    next.run(req).await
}

/// Replace bare error responses with rendered error pages.
///
/// Handlers fail with [`crate::response::PageError`], which only marks the
/// response; the page itself needs the request path and viewer, which are
/// available here.
pub async fn error_pages(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let viewer = req.extensions().get::<user::Model>().cloned();

    let response = next.run(req).await;

    let Some(page) = response.extensions().get::<ErrorPage>().cloned() else {
        return response;
    };

    let ctx = state.ctx(viewer.as_ref());
    let rendered = if page.status == StatusCode::NOT_FOUND {
        render!(errors::not_found_html(&ctx, &path))
    } else if page.status.is_server_error() {
        render!(errors::server_error_html(&ctx))
    } else {
        let title = page.status.canonical_reason().unwrap_or("Error");
        render!(errors::client_error_html(&ctx, title, &page.message))
    };

    match rendered {
        Ok(body) => (page.status, Html(body)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render error page");
            response
        }
    }
}
