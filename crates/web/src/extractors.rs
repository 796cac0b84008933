//! Request extractors.

use axum::{
    Form,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use quill_common::AppError;
use quill_db::entities::user;
use serde::de::DeserializeOwned;

use crate::response::PageError;

/// Login page that required-auth views redirect to.
pub const LOGIN_PATH: &str = "/auth/login/";

/// Authenticated user extractor.
///
/// Anonymous requests are redirected to the login page with the current
/// path in `next`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

/// Rejection for [`AuthUser`].
#[derive(Debug)]
pub struct LoginRedirect(String);

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        Redirect::to(&self.0).into_response()
    }
}

/// Login URL that returns to `next` afterwards.
#[must_use]
pub fn login_url(next: &str) -> String {
    format!("{LOGIN_PATH}?next={}", urlencoding::encode(next))
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = LoginRedirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get user from request extensions (set by auth middleware)
        parts
            .extensions
            .get::<user::Model>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| LoginRedirect(login_url(parts.uri.path())))
    }
}

/// Optional authenticated user extractor.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<user::Model>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<user::Model>().cloned()))
    }
}

/// Raw `page` query parameter.
///
/// Kept as a string so that malformed values select the first page instead
/// of failing the request. When `page` is repeated the last value wins.
/// Never rejects.
#[derive(Debug, Clone, Default)]
pub struct PageParam(pub Option<String>);

impl<S> FromRequestParts<S> for PageParam
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let page = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map(|Query(pairs)| {
                pairs
                    .into_iter()
                    .rev()
                    .find(|(key, _)| key == "page")
                    .map(|(_, value)| value)
            })
            .unwrap_or_default();
        Ok(Self(page))
    }
}

/// URL-encoded form body.
///
/// Same as [`Form`], but a malformed body is rendered as an error page.
#[derive(Debug, Clone, Default)]
pub struct PageForm<T>(pub T);

impl<T, S> FromRequest<S> for PageForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = PageError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(Self(value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::response::ErrorPage;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };

    #[test]
    fn test_login_url_encodes_next() {
        assert_eq!(login_url("/new/"), "/auth/login/?next=%2Fnew%2F");
    }

    #[tokio::test]
    async fn test_auth_user_redirects_anonymous() {
        let (mut parts, ()) = Request::builder()
            .uri("/follow/")
            .body(())
            .unwrap()
            .into_parts();

        let rejection = AuthUser::from_request_parts(&mut parts, &()).await.unwrap_err();
        let response = rejection.into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "/auth/login/?next=%2Ffollow%2F"
        );
    }

    #[tokio::test]
    async fn test_page_param() {
        let (mut parts, ()) = Request::builder()
            .uri("/?page=3&x=1")
            .body(())
            .unwrap()
            .into_parts();
        let PageParam(page) = PageParam::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(page.as_deref(), Some("3"));

        let (mut parts, ()) = Request::builder().uri("/?x=1").body(()).unwrap().into_parts();
        let PageParam(page) = PageParam::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(page, None);
    }

    #[tokio::test]
    async fn test_page_param_repeated_takes_last() {
        let (mut parts, ()) = Request::builder()
            .uri("/?page=1&page=2")
            .body(())
            .unwrap()
            .into_parts();
        let PageParam(page) = PageParam::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(page.as_deref(), Some("2"));

        let (mut parts, ()) = Request::builder()
            .uri("/?page=abc&x=1&page=3")
            .body(())
            .unwrap()
            .into_parts();
        let PageParam(page) = PageParam::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(page.as_deref(), Some("3"));
    }

    #[derive(Debug, serde::Deserialize)]
    struct Note {
        text: String,
    }

    #[tokio::test]
    async fn test_page_form() {
        let req = Request::builder()
            .method("POST")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("text=hi+there"))
            .unwrap();
        let PageForm(note) = PageForm::<Note>::from_request(req, &()).await.unwrap();
        assert_eq!(note.text, "hi there");
    }

    #[tokio::test]
    async fn test_page_form_rejection_is_error_page() {
        let req = Request::builder()
            .method("POST")
            .header("content-type", "text/plain")
            .body(Body::from("text=hi"))
            .unwrap();

        let response = PageForm::<Note>::from_request(req, &())
            .await
            .unwrap_err()
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.extensions().get::<ErrorPage>().is_some());
    }

    #[tokio::test]
    async fn test_maybe_auth_user_anonymous() {
        let (mut parts, ()) = Request::builder().uri("/").body(()).unwrap().into_parts();

        let MaybeAuthUser(user) = MaybeAuthUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(user.is_none());
    }
}
