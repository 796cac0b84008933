//! Comment service.

use std::collections::HashMap;

use quill_common::{AppError, AppResult, IdGenerator};
use quill_db::{
    entities::{comment, user},
    repositories::{CommentRepository, UserRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

/// Input for a new comment.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CommentInput {
    #[validate(length(max = 2000, message = "Ensure this value has at most 2000 characters."))]
    pub text: String,
}

impl CommentInput {
    /// Validate the comment, including the non-blank rule.
    pub fn check(&self) -> AppResult<()> {
        self.validate()?;
        if self.text.trim().is_empty() {
            return Err(AppError::Validation("This field is required.".to_string()));
        }
        Ok(())
    }
}

/// A comment with its author.
#[derive(Debug, Clone)]
pub struct CommentView {
    pub comment: comment::Model,
    pub author: user::Model,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(comment_repo: CommentRepository, user_repo: UserRepository) -> Self {
        Self {
            comment_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Attach a comment by `author_id` to `post_id`.
    pub async fn create(
        &self,
        post_id: &str,
        author_id: &str,
        input: CommentInput,
    ) -> AppResult<comment::Model> {
        input.check()?;

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post_id.to_string()),
            user_id: Set(author_id.to_string()),
            text: Set(input.text),
            created_at: Set(chrono::Utc::now().into()),
        };

        let comment = self.comment_repo.create(model).await?;
        tracing::info!(
            comment_id = %comment.id,
            post_id = %post_id,
            user_id = %author_id,
            "Comment added"
        );

        Ok(comment)
    }

    /// All comments on a post, oldest first, with their authors.
    pub async fn list_for_post(&self, post_id: &str) -> AppResult<Vec<CommentView>> {
        let comments = self.comment_repo.find_by_post(post_id).await?;

        let mut user_ids: Vec<String> = comments.iter().map(|c| c.user_id.clone()).collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let users: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        comments
            .into_iter()
            .map(|comment| {
                let author = users
                    .get(&comment.user_id)
                    .cloned()
                    .ok_or_else(|| AppError::UserNotFound(comment.user_id.clone()))?;
                Ok(CommentView { comment, author })
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn service(db: MockDatabase) -> CommentService {
        let db = Arc::new(db.into_connection());
        CommentService::new(
            CommentRepository::new(Arc::clone(&db)),
            UserRepository::new(db),
        )
    }

    #[test]
    fn test_check_rejects_blank() {
        let input = CommentInput {
            text: " \t ".to_string(),
        };
        assert!(input.check().is_err());
    }

    #[test]
    fn test_check_rejects_too_long() {
        let input = CommentInput {
            text: "x".repeat(2001),
        };
        assert!(input.check().is_err());
    }

    #[tokio::test]
    async fn test_create_blank_skips_insert() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service
            .create("p1", "u1", CommentInput { text: String::new() })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_for_post_attaches_authors() {
        let comment = comment::Model {
            id: "c1".to_string(),
            post_id: "p1".to_string(),
            user_id: "u1".to_string(),
            text: "first!".to_string(),
            created_at: Utc::now().into(),
        };
        let author = user::Model {
            id: "u1".to_string(),
            username: "leo".to_string(),
            username_lower: "leo".to_string(),
            email: String::new(),
            password: String::new(),
            token: None,
            name: None,
            created_at: Utc::now().into(),
            updated_at: None,
        };

        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[comment]])
                .append_query_results([[author]]),
        );

        let result = service.list_for_post("p1").await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].author.username, "leo");
        assert_eq!(result[0].comment.text, "first!");
    }
}
