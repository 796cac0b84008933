//! Test utilities for database operations.
//!
//! Every [`TestDatabase`] is a private in-memory `SQLite` database with the
//! full schema applied, so tests can run in parallel without a server.

use std::sync::Arc;

use quill_common::config::DatabaseConfig;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::debug;

use crate::migrations::Migrator;

/// URL of a fresh in-memory database.
pub const MEMORY_URL: &str = "sqlite::memory:";

/// A migrated throwaway database.
pub struct TestDatabase {
    /// Database connection.
    pub conn: Arc<DatabaseConnection>,
}

impl TestDatabase {
    /// Create a new in-memory database and run all migrations.
    pub async fn new() -> Result<Self, DbErr> {
        let config = DatabaseConfig {
            url: MEMORY_URL.to_string(),
            ..DatabaseConfig::default()
        };
        let mut opt = crate::connect_options(&config).map_err(|e| DbErr::Custom(e.to_string()))?;
        opt.sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        conn.execute_unprepared("PRAGMA foreign_keys = ON").await?;
        Migrator::up(&conn, None).await?;

        debug!("Created in-memory test database");

        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Get the database connection.
    #[must_use]
    pub fn connection(&self) -> Arc<DatabaseConnection> {
        Arc::clone(&self.conn)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::{group, user};
    use crate::repositories::{
        FollowRepository, GroupRepository, PostRepository, PostScope, UserRepository,
    };
    use chrono::{Duration, Utc};
    use sea_orm::Set;

    async fn insert_user(repo: &UserRepository, id: &str, username: &str) -> user::Model {
        repo.create(user::ActiveModel {
            id: Set(id.to_string()),
            username: Set(username.to_string()),
            username_lower: Set(username.to_lowercase()),
            email: Set(String::new()),
            password: Set("hash".to_string()),
            token: Set(None),
            name: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_migrated_schema_roundtrip() {
        let db = TestDatabase::new().await.unwrap();
        let users = UserRepository::new(db.connection());

        insert_user(&users, "u1", "Leo").await;

        let found = users.find_by_username("leo").await.unwrap().unwrap();
        assert_eq!(found.id, "u1");
    }

    #[tokio::test]
    async fn test_username_is_unique_ignoring_case() {
        let db = TestDatabase::new().await.unwrap();
        let users = UserRepository::new(db.connection());

        insert_user(&users, "u1", "Leo").await;
        let dup = users
            .create(user::ActiveModel {
                id: Set("u2".to_string()),
                username: Set("LEO".to_string()),
                username_lower: Set("leo".to_string()),
                email: Set(String::new()),
                password: Set("hash".to_string()),
                token: Set(None),
                name: Set(None),
                created_at: Set(Utc::now().into()),
                updated_at: Set(None),
            })
            .await;

        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_feed_order_newest_first() {
        let db = TestDatabase::new().await.unwrap();
        let conn = db.connection();
        let users = UserRepository::new(Arc::clone(&conn));
        let groups = GroupRepository::new(Arc::clone(&conn));
        let posts = PostRepository::new(Arc::clone(&conn));

        insert_user(&users, "u1", "leo").await;
        groups
            .create(group::ActiveModel {
                id: Set("g1".to_string()),
                title: Set("Cats".to_string()),
                slug: Set("cats".to_string()),
                description: Set(String::new()),
                created_at: Set(Utc::now().into()),
            })
            .await
            .unwrap();

        let base = Utc::now();
        for i in 0..3_i64 {
            posts
                .create(crate::entities::post::ActiveModel {
                    id: Set(format!("p{i}")),
                    text: Set(format!("post {i}")),
                    user_id: Set("u1".to_string()),
                    group_id: Set((i != 1).then(|| "g1".to_string())),
                    image: Set(None),
                    created_at: Set((base + Duration::seconds(i)).into()),
                    updated_at: Set(None),
                })
                .await
                .unwrap();
        }

        let all = posts.find_page(PostScope::All, 0, 10).await.unwrap();
        let ids: Vec<_> = all.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["p2", "p1", "p0"]);

        assert_eq!(posts.count(PostScope::Group("g1")).await.unwrap(), 2);
        let second = posts.find_page(PostScope::All, 1, 1).await.unwrap();
        assert_eq!(second[0].id, "p1");
    }

    #[tokio::test]
    async fn test_follow_pair_is_unique() {
        let db = TestDatabase::new().await.unwrap();
        let conn = db.connection();
        let users = UserRepository::new(Arc::clone(&conn));
        let follows = FollowRepository::new(Arc::clone(&conn));

        insert_user(&users, "u1", "leo").await;
        insert_user(&users, "u2", "ann").await;

        let edge = |id: &str| crate::entities::follow::ActiveModel {
            id: Set(id.to_string()),
            user_id: Set("u1".to_string()),
            author_id: Set("u2".to_string()),
            created_at: Set(Utc::now().into()),
        };

        follows.create(edge("f1")).await.unwrap();
        assert!(matches!(
            follows.create(edge("f2")).await,
            Err(quill_common::AppError::Conflict(_))
        ));

        assert_eq!(follows.find_author_ids("u1").await.unwrap(), ["u2"]);
        assert_eq!(follows.count_followers("u2").await.unwrap(), 1);
        assert_eq!(follows.count_following("u1").await.unwrap(), 1);
    }
}
