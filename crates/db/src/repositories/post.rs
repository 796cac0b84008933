//! Post repository.

use std::sync::Arc;

use crate::entities::{Post, post};
use quill_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};

/// Which posts a feed query covers.
#[derive(Debug, Clone, Copy)]
pub enum PostScope<'a> {
    /// Every post.
    All,
    /// Posts tagged with a group.
    Group(&'a str),
    /// Posts written by a single user.
    Author(&'a str),
    /// Posts written by any of the given users.
    Authors(&'a [String]),
}

impl PostScope<'_> {
    fn apply(self, query: Select<Post>) -> Select<Post> {
        match self {
            Self::All => query,
            Self::Group(group_id) => query.filter(post::Column::GroupId.eq(group_id)),
            Self::Author(user_id) => query.filter(post::Column::UserId.eq(user_id)),
            Self::Authors(user_ids) => {
                query.filter(post::Column::UserId.is_in(user_ids.iter().cloned()))
            }
        }
    }
}

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a post.
    pub async fn update(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count posts in a scope.
    pub async fn count(&self, scope: PostScope<'_>) -> AppResult<u64> {
        if matches!(scope, PostScope::Authors(ids) if ids.is_empty()) {
            return Ok(0);
        }

        scope
            .apply(Post::find())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get one page of posts in a scope, newest first.
    pub async fn find_page(
        &self,
        scope: PostScope<'_>,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        if matches!(scope, PostScope::Authors(ids) if ids.is_empty()) {
            return Ok(vec![]);
        }

        scope
            .apply(Post::find())
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_post(id: &str, user_id: &str, group_id: Option<&str>) -> post::Model {
        post::Model {
            id: id.to_string(),
            text: format!("post {id}"),
            user_id: user_id.to_string(),
            group_id: group_id.map(ToString::to_string),
            image: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_id_found() {
        let post = create_test_post("p1", "user1", None);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post.clone()]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.find_by_id("p1").await.unwrap();

        assert_eq!(result.unwrap().user_id, "user1");
    }

    #[tokio::test]
    async fn test_count_by_group() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(13))
                }]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let count = repo.count(PostScope::Group("g1")).await.unwrap();

        assert_eq!(count, 13);
    }

    #[tokio::test]
    async fn test_find_page() {
        let p1 = create_test_post("p2", "user1", Some("g1"));
        let p2 = create_test_post("p1", "user1", Some("g1"));

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[p1, p2]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo
            .find_page(PostScope::Author("user1"), 0, 10)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "p2");
    }

    #[tokio::test]
    async fn test_empty_author_list_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = PostRepository::new(db);

        assert_eq!(repo.count(PostScope::Authors(&[])).await.unwrap(), 0);
        assert!(
            repo.find_page(PostScope::Authors(&[]), 0, 10)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
