//! Follow repository.

use std::sync::Arc;

use crate::entities::{Follow, follow};
use quill_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, SqlErr,
};

/// Follow repository for database operations.
#[derive(Clone)]
pub struct FollowRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRepository {
    /// Create a new follow repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a follow edge by follower and author.
    pub async fn find_by_pair(
        &self,
        user_id: &str,
        author_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        Follow::find()
            .filter(follow::Column::UserId.eq(user_id))
            .filter(follow::Column::AuthorId.eq(author_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a user follows an author.
    pub async fn is_following(&self, user_id: &str, author_id: &str) -> AppResult<bool> {
        Ok(self.find_by_pair(user_id, author_id).await?.is_some())
    }

    /// Create a new follow edge.
    ///
    /// An edge that already exists for the pair is a `Conflict`.
    pub async fn create(&self, model: follow::ActiveModel) -> AppResult<follow::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    AppError::Conflict("Follow edge already exists".to_string())
                }
                _ => AppError::Database(e.to_string()),
            })
    }

    /// Delete a follow edge by pair. Returns whether an edge was removed.
    pub async fn delete_by_pair(&self, user_id: &str, author_id: &str) -> AppResult<bool> {
        let Some(edge) = self.find_by_pair(user_id, author_id).await? else {
            return Ok(false);
        };

        edge.delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(true)
    }

    /// Count users following an author.
    pub async fn count_followers(&self, author_id: &str) -> AppResult<u64> {
        Follow::find()
            .filter(follow::Column::AuthorId.eq(author_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count authors a user follows.
    pub async fn count_following(&self, user_id: &str) -> AppResult<u64> {
        Follow::find()
            .filter(follow::Column::UserId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of every author a user follows.
    pub async fn find_author_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        Follow::find()
            .select_only()
            .column(follow::Column::AuthorId)
            .filter(follow::Column::UserId.eq(user_id))
            .order_by_asc(follow::Column::CreatedAt)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
