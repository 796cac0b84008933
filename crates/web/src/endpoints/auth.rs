//! Signup, login and logout.

use axum::{
    Router,
    extract::{Query, State, rejection::QueryRejection},
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use quill_common::AppError;
use quill_core::SignupInput;
use serde::Deserialize;

use crate::{
    extractors::{MaybeAuthUser, PageForm},
    forms::{
        FormErrors, LoginForm, NON_FIELD, safe_next, validate_signup, validation_message,
    },
    middleware::{AppState, TOKEN_COOKIE},
    pages::render,
    response::{PageResult, page, see_other},
};

const INVALID_LOGIN: &str = "Invalid username or password.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup/", get(signup_form).post(signup))
        .route("/auth/login/", get(login_form).post(login))
        .route("/auth/logout/", get(logout))
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

async fn signup_form(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
) -> PageResult {
    Ok(page(render!(auth::signup_html(
        &state.ctx(viewer.as_ref()),
        &SignupInput::default(),
        &FormErrors::new()
    ))?))
}

async fn signup(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    jar: CookieJar,
    PageForm(input): PageForm<SignupInput>,
) -> PageResult {
    let mut errors = validate_signup(&input);

    if errors.is_empty() {
        match state.user_service.signup(input.clone()).await {
            Ok(user) => {
                let Some(token) = user.token else {
                    return Err(
                        AppError::Internal("New user has no session token".to_string()).into(),
                    );
                };
                return Ok((jar.add(session_cookie(token)), see_other("/")).into_response());
            }
            Err(e @ AppError::Conflict(_)) => errors.add("username", validation_message(&e)),
            Err(e @ AppError::Validation(_)) => errors.add(NON_FIELD, validation_message(&e)),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(page(render!(auth::signup_html(
        &state.ctx(viewer.as_ref()),
        &input,
        &errors
    ))?))
}

#[derive(Debug, Default, Deserialize)]
struct NextQuery {
    next: Option<String>,
}

async fn login_form(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    query: Result<Query<NextQuery>, QueryRejection>,
) -> PageResult {
    let next = query.map(|Query(q)| q.next).unwrap_or_default();
    let values = LoginForm {
        next: safe_next(next.as_deref()).map(ToString::to_string),
        ..LoginForm::default()
    };

    Ok(page(render!(auth::login_html(
        &state.ctx(viewer.as_ref()),
        &values,
        &FormErrors::new()
    ))?))
}

async fn login(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    jar: CookieJar,
    PageForm(form): PageForm<LoginForm>,
) -> PageResult {
    match state
        .user_service
        .authenticate(&form.username, &form.password)
        .await
    {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "User logged in");
            let Some(token) = user.token else {
                return Err(AppError::Internal(
                    "Authenticated user has no session token".to_string(),
                )
                .into());
            };
            let target = safe_next(form.next.as_deref()).unwrap_or("/");
            Ok((jar.add(session_cookie(token)), see_other(target)).into_response())
        }
        Err(AppError::Unauthorized) => {
            tracing::debug!(username = %form.username, "Login failed");
            let mut errors = FormErrors::new();
            errors.add(NON_FIELD, INVALID_LOGIN);
            let values = LoginForm {
                password: String::new(),
                ..form
            };
            Ok(page(render!(auth::login_html(
                &state.ctx(viewer.as_ref()),
                &values,
                &errors
            ))?))
        }
        Err(e) => Err(e.into()),
    }
}

async fn logout(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    jar: CookieJar,
) -> PageResult {
    if let Some(user) = viewer {
        let user_id = user.id.clone();
        state.user_service.rotate_token(user).await?;
        tracing::info!(user_id = %user_id, "User logged out");
    }

    let removal = Cookie::build((TOKEN_COOKIE, "")).path("/").build();
    Ok((jar.remove(removal), see_other("/")).into_response())
}
