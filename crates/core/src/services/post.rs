//! Post service: authoring, editing and feeds.

use std::collections::HashMap;

use quill_common::{AppError, AppResult, IdGenerator};
use quill_db::{
    entities::{group, post, user},
    repositories::{FollowRepository, GroupRepository, PostRepository, PostScope, UserRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::pagination::{POSTS_PER_PAGE, Page, PageRequest};

/// Maximum post length in characters.
pub const MAX_POST_LENGTH: u64 = 10_000;

/// Message for a group id that does not match any group.
pub const INVALID_GROUP_MESSAGE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    user_repo: UserRepository,
    group_repo: GroupRepository,
    follow_repo: FollowRepository,
    id_gen: IdGenerator,
}

/// Text and group of a post being created or edited.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct PostInput {
    #[validate(length(max = 10000, message = "Ensure this value has at most 10000 characters."))]
    pub text: String,

    /// Group ID; `None` or empty leaves the post ungrouped.
    pub group_id: Option<String>,
}

/// What an edit does with the attached image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChange {
    /// Leave the current image in place.
    Keep,
    /// Remove the current image.
    Clear,
    /// Attach a newly stored image.
    Replace(String),
}

/// A post together with the rows needed to render it.
#[derive(Debug, Clone)]
pub struct PostView {
    pub post: post::Model,
    pub author: user::Model,
    pub group: Option<group::Model>,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        user_repo: UserRepository,
        group_repo: GroupRepository,
        follow_repo: FollowRepository,
    ) -> Self {
        Self {
            post_repo,
            user_repo,
            group_repo,
            follow_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Publish a new post authored by `author_id`.
    pub async fn create(
        &self,
        author_id: &str,
        input: PostInput,
        image: Option<String>,
    ) -> AppResult<post::Model> {
        let text = check_text(&input)?;
        let group_id = self.resolve_group(input.group_id.as_deref()).await?;

        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            text: Set(text),
            user_id: Set(author_id.to_string()),
            group_id: Set(group_id),
            image: Set(image),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };

        let post = self.post_repo.create(model).await?;
        tracing::info!(post_id = %post.id, user_id = %author_id, "Post created");

        Ok(post)
    }

    /// Apply an edit. Only the author may edit; the author itself never changes.
    pub async fn update(
        &self,
        editor_id: &str,
        post: post::Model,
        input: PostInput,
        image: ImageChange,
    ) -> AppResult<post::Model> {
        if post.user_id != editor_id {
            return Err(AppError::Forbidden(
                "Only the author can edit this post".to_string(),
            ));
        }

        let text = check_text(&input)?;
        let group_id = self.resolve_group(input.group_id.as_deref()).await?;

        let mut model: post::ActiveModel = post.into();
        model.text = Set(text);
        model.group_id = Set(group_id);
        match image {
            ImageChange::Keep => {}
            ImageChange::Clear => model.image = Set(None),
            ImageChange::Replace(key) => model.image = Set(Some(key)),
        }
        model.updated_at = Set(Some(chrono::Utc::now().into()));

        let post = self.post_repo.update(model).await?;
        tracing::info!(post_id = %post.id, user_id = %editor_id, "Post edited");

        Ok(post)
    }

    /// Find the post `post_id` written by `username`.
    ///
    /// A post that exists but belongs to someone else is reported as missing.
    pub async fn get_for_author(&self, username: &str, post_id: &str) -> AppResult<PostView> {
        let author = self
            .user_repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::UserNotFound(username.to_string()))?;

        let post = self
            .post_repo
            .find_by_id(post_id)
            .await?
            .filter(|p| p.user_id == author.id)
            .ok_or_else(|| AppError::PostNotFound(post_id.to_string()))?;

        let group = match post.group_id.as_deref() {
            Some(group_id) => self.group_repo.find_by_id(group_id).await?,
            None => None,
        };

        Ok(PostView {
            post,
            author,
            group,
        })
    }

    /// Number of posts written by a user.
    pub async fn count_by_author(&self, author_id: &str) -> AppResult<u64> {
        self.post_repo.count(PostScope::Author(author_id)).await
    }

    /// The site-wide feed.
    pub async fn index_feed(&self, page: Option<&str>) -> AppResult<Page<PostView>> {
        self.feed(PostScope::All, page).await
    }

    /// Posts tagged with a group.
    pub async fn group_feed(&self, group_id: &str, page: Option<&str>) -> AppResult<Page<PostView>> {
        self.feed(PostScope::Group(group_id), page).await
    }

    /// Posts written by one author.
    pub async fn profile_feed(
        &self,
        author_id: &str,
        page: Option<&str>,
    ) -> AppResult<Page<PostView>> {
        self.feed(PostScope::Author(author_id), page).await
    }

    /// Posts by the authors `viewer_id` follows.
    ///
    /// A viewer who follows nobody has no feed at all and gets `NotFound`.
    pub async fn follow_feed(&self, viewer_id: &str, page: Option<&str>) -> AppResult<Page<PostView>> {
        let author_ids = self.follow_repo.find_author_ids(viewer_id).await?;
        if author_ids.is_empty() {
            return Err(AppError::NotFound(
                "You are not following anyone yet".to_string(),
            ));
        }

        self.feed(PostScope::Authors(&author_ids), page).await
    }

    async fn feed(&self, scope: PostScope<'_>, page: Option<&str>) -> AppResult<Page<PostView>> {
        let count = self.post_repo.count(scope).await?;
        let request = PageRequest::resolve(count, POSTS_PER_PAGE, page);

        let posts = self
            .post_repo
            .find_page(scope, request.offset(), request.limit())
            .await?;

        Ok(Page::new(request, self.hydrate(posts).await?))
    }

    /// Attach authors and groups to a batch of posts.
    async fn hydrate(&self, posts: Vec<post::Model>) -> AppResult<Vec<PostView>> {
        let mut user_ids: Vec<String> = posts.iter().map(|p| p.user_id.clone()).collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let mut group_ids: Vec<String> = posts.iter().filter_map(|p| p.group_id.clone()).collect();
        group_ids.sort_unstable();
        group_ids.dedup();

        let users: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let groups: HashMap<String, group::Model> = self
            .group_repo
            .find_by_ids(&group_ids)
            .await?
            .into_iter()
            .map(|g| (g.id.clone(), g))
            .collect();

        posts
            .into_iter()
            .map(|post| {
                let author = users
                    .get(&post.user_id)
                    .cloned()
                    .ok_or_else(|| AppError::UserNotFound(post.user_id.clone()))?;
                let group = post.group_id.as_ref().and_then(|id| groups.get(id)).cloned();
                Ok(PostView {
                    post,
                    author,
                    group,
                })
            })
            .collect()
    }

    /// Map an optional group id to an existing group id.
    async fn resolve_group(&self, group_id: Option<&str>) -> AppResult<Option<String>> {
        let Some(group_id) = group_id.map(str::trim).filter(|id| !id.is_empty()) else {
            return Ok(None);
        };

        match self.group_repo.find_by_id(group_id).await? {
            Some(group) => Ok(Some(group.id)),
            None => Err(AppError::Validation(INVALID_GROUP_MESSAGE.to_string())),
        }
    }
}

/// Validate post text, returning it ready to store.
fn check_text(input: &PostInput) -> AppResult<String> {
    input.validate()?;
    if input.text.trim().is_empty() {
        return Err(AppError::Validation("This field is required.".to_string()));
    }
    Ok(input.text.clone())
}
