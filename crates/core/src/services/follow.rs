//! Follow service.

use quill_common::{AppError, AppResult, IdGenerator};
use quill_db::{entities::follow, repositories::FollowRepository};
use sea_orm::Set;

/// Follow service for business logic.
#[derive(Clone)]
pub struct FollowService {
    follow_repo: FollowRepository,
    id_gen: IdGenerator,
}

/// Result of a follow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowResult {
    /// A new edge was created.
    Followed,
    /// The edge already existed; nothing changed.
    AlreadyFollowing,
    /// Users cannot follow themselves; nothing changed.
    SelfFollow,
}

impl FollowService {
    /// Create a new follow service.
    #[must_use]
    pub const fn new(follow_repo: FollowRepository) -> Self {
        Self {
            follow_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Make `user_id` follow `author_id`. Self-follows and repeats are no-ops.
    pub async fn follow(&self, user_id: &str, author_id: &str) -> AppResult<FollowResult> {
        if user_id == author_id {
            return Ok(FollowResult::SelfFollow);
        }

        if self.follow_repo.is_following(user_id, author_id).await? {
            return Ok(FollowResult::AlreadyFollowing);
        }

        self.insert_edge(user_id, author_id).await
    }

    /// Insert the edge. A concurrent request may have inserted it since the
    /// `is_following` check; the unique pair index turns that into a no-op.
    async fn insert_edge(&self, user_id: &str, author_id: &str) -> AppResult<FollowResult> {
        let model = follow::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            author_id: Set(author_id.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };

        match self.follow_repo.create(model).await {
            Ok(_) => {
                tracing::info!(user_id = %user_id, author_id = %author_id, "Followed author");
                Ok(FollowResult::Followed)
            }
            Err(AppError::Conflict(_)) => {
                tracing::debug!(user_id = %user_id, author_id = %author_id, "Follow already recorded");
                Ok(FollowResult::AlreadyFollowing)
            }
            Err(e) => Err(e),
        }
    }

    /// Remove the edge from `user_id` to `author_id`; a missing edge is `NotFound`.
    pub async fn unfollow(&self, user_id: &str, author_id: &str) -> AppResult<()> {
        if !self.follow_repo.delete_by_pair(user_id, author_id).await? {
            return Err(AppError::NotFound(format!(
                "{user_id} does not follow {author_id}"
            )));
        }

        tracing::info!(user_id = %user_id, author_id = %author_id, "Unfollowed author");
        Ok(())
    }
}
