//! HTML form parsing and field-level validation.

use std::collections::BTreeMap;

use axum::{
    Form,
    extract::{FromRequest, Multipart, Request},
    http::{HeaderValue, header::CONTENT_TYPE},
};
use bytes::Bytes;
use quill_common::AppError;
use quill_core::{
    CommentInput, PostInput, SignupInput,
    media::validate_image,
    post::{INVALID_GROUP_MESSAGE, MAX_POST_LENGTH},
};
use quill_db::entities::group;
use serde::Deserialize;
use validator::{Validate, ValidationErrors};

use crate::response::PageError;

/// Key for errors that belong to the form as a whole.
pub const NON_FIELD: &str = "__all__";

const REQUIRED: &str = "This field is required.";

/// Validation messages grouped by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    /// No errors yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against `field`.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    /// Messages for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    /// Whether `field` has any messages.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    /// Whether the form validated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge errors reported by a `validator` derive.
    pub fn extend_validation(&mut self, errors: &ValidationErrors) {
        for (field, errs) in errors.field_errors() {
            for err in errs {
                let message = err
                    .message
                    .as_ref()
                    .map_or_else(|| format!("Invalid value ({})", err.code), ToString::to_string);
                self.add(&field, message);
            }
        }
    }
}

/// Uploaded file part.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied file name.
    pub file_name: Option<String>,
    /// File content.
    pub data: Bytes,
}

/// Submitted post form.
///
/// Accepts both `multipart/form-data` (with an optional `image` file) and
/// `application/x-www-form-urlencoded`.
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<Upload>,
    /// `image-clear` checkbox: drop the current image on edit.
    pub clear_image: bool,
}

#[derive(Debug, Deserialize)]
struct UrlencodedPostForm {
    #[serde(default)]
    text: String,
    #[serde(default)]
    group: Option<String>,
    #[serde(default, rename = "image-clear")]
    image_clear: Option<String>,
}

impl<S> FromRequest<S> for PostForm
where
    S: Send + Sync,
{
    type Rejection = PageError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return Self::from_multipart(multipart).await;
        }

        let Form(raw) = Form::<UrlencodedPostForm>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        Ok(Self {
            text: raw.text,
            group: non_empty(raw.group),
            image: None,
            clear_image: raw.image_clear.is_some(),
        })
    }
}

impl PostForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, PageError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();

            match name.as_str() {
                "image" => {
                    let file_name = field.file_name().map(ToString::to_string);
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    // Browsers send an empty part when no file was chosen
                    if !data.is_empty() || file_name.as_deref().is_some_and(|n| !n.is_empty()) {
                        form.image = Some(Upload { file_name, data });
                    }
                }
                "text" | "group" | "image-clear" => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    match name.as_str() {
                        "text" => form.text = value,
                        "group" => form.group = non_empty(Some(value)),
                        _ => form.clear_image = true,
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// Field-level validation against the available groups.
    #[must_use]
    pub fn validate(&self, groups: &[group::Model]) -> FormErrors {
        let mut errors = FormErrors::new();

        if self.text.trim().is_empty() {
            errors.add("text", REQUIRED);
        } else if self.text.chars().count() as u64 > MAX_POST_LENGTH {
            errors.add(
                "text",
                format!("Ensure this value has at most {MAX_POST_LENGTH} characters."),
            );
        }

        if let Some(group_id) = &self.group
            && !groups.iter().any(|g| &g.id == group_id)
        {
            errors.add("group", INVALID_GROUP_MESSAGE);
        }

        if let Some(upload) = &self.image
            && let Err(e) = validate_image(&upload.data)
        {
            tracing::warn!(
                file_name = ?upload.file_name,
                size = upload.data.len(),
                "Rejected post image"
            );
            errors.add("image", validation_message(&e));
        }

        errors
    }

    /// Whether `group_id` is the chosen group.
    #[must_use]
    pub fn selects_group(&self, group_id: &str) -> bool {
        self.group.as_deref() == Some(group_id)
    }

    /// Text and group for the post service.
    #[must_use]
    pub fn input(&self) -> PostInput {
        PostInput {
            text: self.text.clone(),
            group_id: self.group.clone(),
        }
    }
}

/// Validate a comment form.
#[must_use]
pub fn validate_comment(input: &CommentInput) -> FormErrors {
    let mut errors = FormErrors::new();
    if let Err(e) = input.validate() {
        errors.extend_validation(&e);
    }
    if input.text.trim().is_empty() {
        errors.add("text", REQUIRED);
    }
    errors
}

/// Validate a signup form.
#[must_use]
pub fn validate_signup(input: &SignupInput) -> FormErrors {
    let mut errors = FormErrors::new();
    if let Err(e) = input.validate() {
        errors.extend_validation(&e);
    }
    if let Err(e) = quill_core::user::check_username(input.username.trim()) {
        errors.add("username", validation_message(&e));
    }
    errors
}

/// Submitted login form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    /// Local path to return to after logging in.
    pub next: Option<String>,
}

/// Only same-site absolute paths are accepted as redirect targets.
///
/// Browsers drop tabs and newlines from URLs, so `/\t/host` would turn into
/// `//host`; any control character rejects the target.
#[must_use]
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| {
        n.starts_with('/')
            && !n.starts_with("//")
            && !n.contains('\\')
            && !n.chars().any(|c| c.is_ascii_control())
            && HeaderValue::from_str(n).is_ok()
    })
}

/// User-facing text of a validation error.
#[must_use]
pub fn validation_message(err: &AppError) -> String {
    match err {
        AppError::Validation(msg) | AppError::Conflict(msg) => msg.clone(),
        other => other.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use chrono::Utc;

    fn group(id: &str) -> group::Model {
        group::Model {
            id: id.to_string(),
            title: "Cats".to_string(),
            slug: "cats".to_string(),
            description: String::new(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_urlencoded_post_form() {
        let req = Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("text=hello+world&group=&image-clear=on"))
            .unwrap();

        let form = PostForm::from_request(req, &()).await.unwrap();

        assert_eq!(form.text, "hello world");
        assert_eq!(form.group, None);
        assert!(form.clear_image);
        assert!(form.image.is_none());
    }

    #[tokio::test]
    async fn test_multipart_post_form() {
        let body = "--XX\r\n\
            Content-Disposition: form-data; name=\"text\"\r\n\r\n\
            multipart text\r\n\
            --XX\r\n\
            Content-Disposition: form-data; name=\"group\"\r\n\r\n\
            g1\r\n\
            --XX\r\n\
            Content-Disposition: form-data; name=\"image\"; filename=\"\"\r\n\
            Content-Type: application/octet-stream\r\n\r\n\
            \r\n\
            --XX--\r\n";
        let req = Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "multipart/form-data; boundary=XX")
            .body(Body::from(body))
            .unwrap();

        let form = PostForm::from_request(req, &()).await.unwrap();

        assert_eq!(form.text, "multipart text");
        assert_eq!(form.group.as_deref(), Some("g1"));
        assert!(form.image.is_none());
        assert!(!form.clear_image);
    }

    #[test]
    fn test_validate_blank_text() {
        let form = PostForm {
            text: "   ".to_string(),
            ..PostForm::default()
        };

        assert_eq!(form.validate(&[]).get("text"), [REQUIRED]);
    }

    #[test]
    fn test_validate_unknown_group() {
        let form = PostForm {
            text: "hi".to_string(),
            group: Some("g2".to_string()),
            ..PostForm::default()
        };

        assert!(form.validate(&[group("g1")]).get("group")[0].starts_with("Select a valid"));
        assert!(form.validate(&[group("g2")]).is_empty());
    }

    #[test]
    fn test_validate_non_image_upload() {
        let form = PostForm {
            text: "hi".to_string(),
            image: Some(Upload {
                file_name: Some("notes.txt".to_string()),
                data: Bytes::from_static(b"just some text"),
            }),
            ..PostForm::default()
        };

        assert!(form.validate(&[]).get("image")[0].starts_with("Upload a valid image"));
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/new/")), Some("/new/"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn test_safe_next_rejects_control_characters() {
        assert_eq!(safe_next(Some("/\t/evil.example")), None);
        assert_eq!(safe_next(Some("/\nabc")), None);
        assert_eq!(safe_next(Some("/\r\nSet-Cookie: a=b")), None);
        assert_eq!(safe_next(Some("/\u{7f}")), None);
        assert_eq!(safe_next(Some("/a b/")), Some("/a b/"));
    }

    #[test]
    fn test_validate_signup_collects_errors() {
        let input = SignupInput {
            username: "new".to_string(),
            email: "nope".to_string(),
            password: "longenough".to_string(),
            password_confirm: "different!".to_string(),
        };

        let errors = validate_signup(&input);
        assert!(!errors.get("username").is_empty());
        assert!(!errors.get("email").is_empty());
        assert!(!errors.get("password_confirm").is_empty());
    }
}
