//! Page rendering.
//!
//! Pages are ructe templates compiled from `templates/` by the build
//! script. Values interpolated with `@expr` are HTML-escaped by the
//! generated code.

use std::io;

use quill_common::AppError;
use quill_core::MediaService;
use quill_db::entities::user;

/// Data every page needs.
#[derive(Clone, Copy)]
pub struct Ctx<'a> {
    /// Site name for titles and the header.
    pub site_name: &'a str,
    /// Signed-in user, if any.
    pub viewer: Option<&'a user::Model>,
    /// Resolves stored image keys to URLs.
    pub media: &'a MediaService,
}

impl Ctx<'_> {
    /// Whether the viewer is `user_id`.
    #[must_use]
    pub fn is_viewer(&self, user_id: &str) -> bool {
        self.viewer.is_some_and(|v| v.id == user_id)
    }
}

/// Which post form is being shown.
#[derive(Debug, Clone, Copy)]
pub enum FormMode<'a> {
    /// Writing a new post.
    New,
    /// Editing an existing post.
    Edit {
        /// Detail page of the edited post.
        post_path: &'a str,
        /// Public URL of the current image.
        current_image: Option<&'a str>,
    },
}

impl FormMode<'_> {
    /// Page title and heading.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::New => "New post",
            Self::Edit { .. } => "Edit post",
        }
    }

    /// Where the form posts to.
    #[must_use]
    pub fn action(&self) -> String {
        match self {
            Self::New => "/new/".to_string(),
            Self::Edit { post_path, .. } => format!("{post_path}edit/"),
        }
    }

    /// Submit button label.
    #[must_use]
    pub const fn submit(&self) -> &'static str {
        match self {
            Self::New => "Publish",
            Self::Edit { .. } => "Save",
        }
    }

    /// Public URL of the image being edited, if any.
    #[must_use]
    pub const fn current_image(&self) -> Option<&str> {
        match self {
            Self::New => None,
            Self::Edit { current_image, .. } => *current_image,
        }
    }
}

/// Link to a post's detail page.
#[must_use]
pub fn post_url(username: &str, post_id: &str) -> String {
    format!("/{username}/{post_id}/")
}

/// Link to page `number` of the feed at `base_path`.
#[must_use]
pub fn page_link(base_path: &str, number: u64) -> String {
    format!("{base_path}?page={number}")
}

/// Collect the output of a template call into a page body.
pub fn finish(out: Vec<u8>, result: io::Result<()>) -> Result<String, AppError> {
    result.map_err(|e| AppError::Internal(format!("Failed to render template: {e}")))?;
    String::from_utf8(out)
        .map_err(|e| AppError::Internal(format!("Template output is not UTF-8: {e}")))
}

/// Render `templates::<group>::<page>(args..)` to a `String`.
macro_rules! render {
    ($group:tt :: $page:tt ( $( $param:expr ),* ) ) => {{
        let mut out = Vec::new();
        let result = $crate::templates::$group::$page(&mut out, $( $param ),*);
        $crate::pages::finish(out, result)
    }};
}

pub(crate) use render;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use quill_common::LocalStorage;
    use quill_core::{Page, PostView};

    use super::*;
    use crate::forms::FormErrors;
    use crate::templates;

    fn render_to_string(write: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut out = Vec::new();
        let result = write(&mut out);
        finish(out, result).unwrap()
    }

    fn empty_page(number: u64, num_pages: u64) -> Page<PostView> {
        Page {
            items: vec![],
            number,
            num_pages,
            count: num_pages * 10,
        }
    }

    #[test]
    fn test_page_link() {
        assert_eq!(page_link("/group/cats/", 3), "/group/cats/?page=3");
    }

    #[test]
    fn test_form_mode_edit() {
        let mode = FormMode::Edit {
            post_path: "/alice/p1/",
            current_image: Some("/media/a.png"),
        };

        assert_eq!(mode.action(), "/alice/p1/edit/");
        assert_eq!(mode.submit(), "Save");
        assert_eq!(mode.current_image(), Some("/media/a.png"));
        assert_eq!(FormMode::New.current_image(), None);
    }

    #[test]
    fn test_paginator_single_page_is_empty() {
        let html =
            render_to_string(|out| templates::paginator_html(out, &empty_page(1, 1), "/"));
        assert!(!html.contains("pagination"));
    }

    #[test]
    fn test_paginator_middle_page() {
        let html = render_to_string(|out| {
            templates::paginator_html(out, &empty_page(2, 3), "/group/cats/")
        });

        assert!(html.contains(r#"href="/group/cats/?page=1""#));
        assert!(html.contains(r#"href="/group/cats/?page=3""#));
        assert!(html.contains("Page 2 of 3"));
    }

    #[test]
    fn test_field_errors_are_escaped() {
        let mut errors = FormErrors::new();
        errors.add("text", "Too <long>");

        let html = render_to_string(|out| templates::field_errors_html(out, &errors, "text"));
        assert!(html.contains(r#"<ul class="errorlist"><li>Too &lt;long&gt;</li></ul>"#));

        let html = render_to_string(|out| templates::field_errors_html(out, &errors, "group"));
        assert!(!html.contains("errorlist"));
    }

    #[test]
    fn test_not_found_page_escapes_path() {
        let storage = Arc::new(LocalStorage::new(
            std::env::temp_dir(),
            "/media".to_string(),
        ));
        let media = MediaService::new(storage);
        let ctx = Ctx {
            site_name: "Quill",
            viewer: None,
            media: &media,
        };

        let html = render!(errors::not_found_html(&ctx, "/<script>/")).unwrap();
        assert!(html.contains("Page not found"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
