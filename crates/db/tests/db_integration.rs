//! Schema integration tests.
//!
//! Run against a migrated in-memory `SQLite` database; no server required.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use quill_db::{
    entities::{comment, group, post, user},
    migrations::Migrator,
    repositories::{CommentRepository, GroupRepository, PostRepository, UserRepository},
    test_utils::TestDatabase,
};
use sea_orm::{EntityTrait, Set};
use sea_orm_migration::MigratorTrait;

fn new_user(id: &str) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(id.to_string()),
        username: Set(id.to_string()),
        username_lower: Set(id.to_lowercase()),
        email: Set(format!("{id}@example.com")),
        password: Set("hash".to_string()),
        token: Set(None),
        name: Set(None),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    }
}

fn new_post(id: &str, user_id: &str, group_id: Option<&str>) -> post::ActiveModel {
    post::ActiveModel {
        id: Set(id.to_string()),
        text: Set(format!("text of {id}")),
        user_id: Set(user_id.to_string()),
        group_id: Set(group_id.map(ToString::to_string)),
        image: Set(None),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    }
}

#[tokio::test]
async fn test_migrations_roll_back_and_reapply() {
    let db = TestDatabase::new().await.unwrap();
    let conn = db.connection();

    Migrator::down(conn.as_ref(), None).await.unwrap();
    assert!(user::Entity::find().all(conn.as_ref()).await.is_err());

    Migrator::up(conn.as_ref(), None).await.unwrap();
    assert!(user::Entity::find().all(conn.as_ref()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_author_removes_posts_and_comments() {
    let db = TestDatabase::new().await.unwrap();
    let conn = db.connection();
    let users = UserRepository::new(conn.clone());
    let posts = PostRepository::new(conn.clone());
    let comments = CommentRepository::new(conn.clone());

    users.create(new_user("u1")).await.unwrap();
    users.create(new_user("u2")).await.unwrap();
    posts.create(new_post("p1", "u1", None)).await.unwrap();
    comments
        .create(comment::ActiveModel {
            id: Set("c1".to_string()),
            post_id: Set("p1".to_string()),
            user_id: Set("u2".to_string()),
            text: Set("hi".to_string()),
            created_at: Set(Utc::now().into()),
        })
        .await
        .unwrap();

    user::Entity::delete_by_id("u1")
        .exec(conn.as_ref())
        .await
        .unwrap();

    assert!(posts.find_by_id("p1").await.unwrap().is_none());
    assert_eq!(comments.count_by_post("p1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_deleting_group_keeps_its_posts() {
    let db = TestDatabase::new().await.unwrap();
    let conn = db.connection();
    let users = UserRepository::new(conn.clone());
    let groups = GroupRepository::new(conn.clone());
    let posts = PostRepository::new(conn.clone());

    users.create(new_user("u1")).await.unwrap();
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
    posts.create(new_post("p1", "u1", Some("g1"))).await.unwrap();

    group::Entity::delete_by_id("g1")
        .exec(conn.as_ref())
        .await
        .unwrap();

    let post = posts.find_by_id("p1").await.unwrap().unwrap();
    assert_eq!(post.group_id, None);
}

#[tokio::test]
async fn test_post_requires_existing_author() {
    let db = TestDatabase::new().await.unwrap();
    let posts = PostRepository::new(db.connection());

    assert!(posts.create(new_post("p1", "ghost", None)).await.is_err());
}
