//! User service: signup, login and profiles.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use once_cell::sync::Lazy;
use quill_common::{AppError, AppResult, IdGenerator};
use quill_db::{
    entities::user,
    repositories::{FollowRepository, PostRepository, PostScope, UserRepository},
};
use regex::Regex;
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// Usernames that would collide with top-level routes.
pub const RESERVED_USERNAMES: &[&str] = &["new", "follow", "group", "auth", "media", "static"];

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[A-Za-z0-9_.\-]+$").unwrap()
});

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    post_repo: PostRepository,
    follow_repo: FollowRepository,
    id_gen: IdGenerator,
}

/// Input for creating a new user.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SignupInput {
    #[validate(length(min = 1, max = 128, message = "Enter a username of at most 128 characters."))]
    pub username: String,

    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters."))]
    pub password: String,

    #[validate(must_match(other = "password", message = "The two password fields didn't match."))]
    pub password_confirm: String,
}

/// Everything the profile page shows about an author.
#[derive(Debug, Clone)]
pub struct Profile {
    pub author: user::Model,
    pub posts_count: u64,
    pub followers_count: u64,
    pub following_count: u64,
    /// Whether the viewer follows the author. `None` for anonymous viewers
    /// and for the author looking at their own profile.
    pub following: Option<bool>,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(
        user_repo: UserRepository,
        post_repo: PostRepository,
        follow_repo: FollowRepository,
    ) -> Self {
        Self {
            user_repo,
            post_repo,
            follow_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new user. The returned model carries a fresh session token.
    pub async fn signup(&self, input: SignupInput) -> AppResult<user::Model> {
        input.validate()?;

        let username = input.username.trim();
        check_username(username)?;

        if self.user_repo.find_by_username(username).await?.is_some() {
            return Err(AppError::Conflict(
                "A user with that username already exists.".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password)?;

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(username.to_string()),
            username_lower: Set(username.to_lowercase()),
            email: Set(input.email.trim().to_string()),
            password: Set(password_hash),
            token: Set(Some(self.id_gen.generate_token())),
            name: Set(None),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };

        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User signed up");

        Ok(user)
    }

    /// Check a username/password pair. The returned model always has a token.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_username(username.trim())
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &user.password)? {
            return Err(AppError::Unauthorized);
        }

        if user.token.is_some() {
            Ok(user)
        } else {
            self.rotate_token(user).await
        }
    }

    /// Resolve a session token to its user.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<Option<user::Model>> {
        if token.is_empty() {
            return Ok(None);
        }
        self.user_repo.find_by_token(token).await
    }

    /// Replace the user's session token, invalidating existing sessions.
    pub async fn rotate_token(&self, user: user::Model) -> AppResult<user::Model> {
        let mut model: user::ActiveModel = user.into();
        model.token = Set(Some(self.id_gen.generate_token()));
        model.updated_at = Set(Some(chrono::Utc::now().into()));
        self.user_repo.update(model).await
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::UserNotFound(username.to_string()))
    }

    /// Look up the profile header for `username` as seen by `viewer_id`.
    pub async fn profile(&self, username: &str, viewer_id: Option<&str>) -> AppResult<Profile> {
        let author = self.get_by_username(username).await?;

        let posts_count = self.post_repo.count(PostScope::Author(&author.id)).await?;
        let followers_count = self.follow_repo.count_followers(&author.id).await?;
        let following_count = self.follow_repo.count_following(&author.id).await?;

        let following = match viewer_id {
            Some(viewer_id) if viewer_id != author.id => {
                Some(self.follow_repo.is_following(viewer_id, &author.id).await?)
            }
            _ => None,
        };

        Ok(Profile {
            author,
            posts_count,
            followers_count,
            following_count,
            following,
        })
    }
}

/// Check the username character set and the reserved list.
pub fn check_username(username: &str) -> AppResult<()> {
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::Validation(
            "Enter a valid username. This value may contain only letters, numbers, and ./-/_ characters."
                .to_string(),
        ));
    }

    if RESERVED_USERNAMES.contains(&username.to_lowercase().as_str()) {
        return Err(AppError::Validation(
            "This username is reserved.".to_string(),
        ));
    }

    Ok(())
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
