//! Group service.

use once_cell::sync::Lazy;
use quill_common::{AppError, AppResult, IdGenerator};
use quill_db::{entities::group, repositories::GroupRepository};
use regex::Regex;
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

static SLUG_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[a-z0-9_-]+$").unwrap()
});

/// Group service for business logic.
#[derive(Clone)]
pub struct GroupService {
    group_repo: GroupRepository,
    id_gen: IdGenerator,
}

/// Input for creating a group.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupInput {
    #[validate(length(min = 1, max = 100))]
    pub slug: String,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[serde(default)]
    pub description: String,
}

impl GroupService {
    /// Create a new group service.
    #[must_use]
    pub const fn new(group_repo: GroupRepository) -> Self {
        Self {
            group_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Get a group by slug.
    pub async fn get_by_slug(&self, slug: &str) -> AppResult<group::Model> {
        self.group_repo
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::GroupNotFound(slug.to_string()))
    }

    /// List all groups, ordered by title.
    pub async fn list(&self) -> AppResult<Vec<group::Model>> {
        self.group_repo.find_all().await
    }

    /// Create a new group.
    pub async fn create(&self, input: CreateGroupInput) -> AppResult<group::Model> {
        input.validate()?;

        if !SLUG_RE.is_match(&input.slug) {
            return Err(AppError::Validation(
                "Slug may contain only lowercase letters, numbers, hyphens and underscores"
                    .to_string(),
            ));
        }

        if self.group_repo.find_by_slug(&input.slug).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Group with slug '{}' already exists",
                input.slug
            )));
        }

        let model = group::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(input.title.trim().to_string()),
            slug: Set(input.slug),
            description: Set(input.description),
            created_at: Set(chrono::Utc::now().into()),
        };

        let group = self.group_repo.create(model).await?;
        tracing::info!(group_id = %group.id, slug = %group.slug, "Group created");

        Ok(group)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_group(id: &str, slug: &str) -> group::Model {
        group::Model {
            id: id.to_string(),
            title: "Cats".to_string(),
            slug: slug.to_string(),
            description: "All about cats".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn input(slug: &str) -> CreateGroupInput {
        CreateGroupInput {
            slug: slug.to_string(),
            title: "Cats".to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_get_by_slug_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<group::Model>::new()])
                .into_connection(),
        );

        let service = GroupService::new(GroupRepository::new(db));
        let result = service.get_by_slug("nope").await;

        assert!(matches!(result, Err(AppError::GroupNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_slug() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let service = GroupService::new(GroupRepository::new(db));
        let result = service.create(input("Not A Slug")).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_slug() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_group("g1", "cats")]])
                .into_connection(),
        );

        let service = GroupService::new(GroupRepository::new(db));
        let result = service.create(input("cats")).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
