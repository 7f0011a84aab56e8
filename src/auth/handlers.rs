use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::session::Session;
use crate::backend::BackendError;
use crate::db::Db;
use crate::error::AppResult;
use crate::extractors::MaybeSession;
use crate::routes::home::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub signup: bool,
    pub email: String,
    pub error: String,
}

#[derive(Template)]
#[template(path = "pages/activate.html")]
pub struct ActivateTemplate {
    pub email: String,
    pub error: String,
}

impl ActivateTemplate {
    fn new(session: &Session, error: &str) -> Self {
        Self {
            email: session.user.email.clone().unwrap_or_default(),
            error: error.to_string(),
        }
    }
}

// -- Request types --

#[derive(Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub mode: String,
}

#[derive(Deserialize)]
pub struct ActivateForm {
    pub invite_code: String,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

/// The message shown under the login form for a failed attempt.
fn auth_error_message(err: &BackendError) -> String {
    match err {
        BackendError::Auth(msg) => msg.clone(),
        BackendError::Unauthorized => "Invalid login credentials".to_string(),
        _ => "Could not reach the service, please try again".to_string(),
    }
}

/// Whether the session's profile has redeemed an invitation. A missing
/// profile row counts as not activated.
async fn is_activated(state: &AppState, session: &Session) -> AppResult<bool> {
    let db = Db::new(state.backend.as_ref(), &session.access_token);
    match db.get_profile(&session.user.id).await {
        Ok(profile) => Ok(profile.is_activated),
        Err(BackendError::NotFound) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

// -- Login handlers --

/// GET /login: sign-in / sign-up form, or the invitation form for a
/// signed-in user who is not activated yet.
pub async fn login_page(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Query(query): Query<LoginQuery>,
) -> AppResult<Response> {
    if let Some(session) = session {
        if is_activated(&state, &session).await? {
            return Ok(Redirect::to("/").into_response());
        }
        return Ok(Html(ActivateTemplate::new(&session, "")).into_response());
    }

    Ok(Html(LoginTemplate {
        signup: query.mode.as_deref() == Some("signup"),
        email: String::new(),
        error: String::new(),
    })
    .into_response())
}

/// POST /login: sign in or sign up, then set the session cookie.
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let signup = form.mode == "signup";
    let email = form.email.trim().to_string();
    let render_error = |error: String| {
        Html(LoginTemplate {
            signup,
            email: email.clone(),
            error,
        })
        .into_response()
    };

    if email.is_empty() || form.password.is_empty() {
        return Ok(render_error("Email and password are required".into()));
    }

    let result = if signup {
        state.sessions.sign_up(&email, &form.password).await
    } else {
        state.sessions.sign_in(&email, &form.password).await
    };

    match result {
        Ok(session) => Ok((
            StatusCode::SEE_OTHER,
            [
                (header::LOCATION, "/".to_string()),
                (
                    header::SET_COOKIE,
                    session_cookie(
                        &state.config.auth.cookie_name,
                        &session.token,
                        state.config.auth.session_hours,
                    ),
                ),
            ],
            "",
        )
            .into_response()),
        Err(e) => {
            tracing::warn!("Authentication failed for {}: {}", email, e);
            Ok(render_error(auth_error_message(&e)))
        }
    }
}

/// POST /login/activate: redeem an invitation code.
pub async fn activate(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Form(form): Form<ActivateForm>,
) -> AppResult<Response> {
    let Some(session) = session else {
        return Ok(Redirect::to("/login").into_response());
    };

    let code = form.invite_code.trim();
    if code.is_empty() {
        return Ok(
            Html(ActivateTemplate::new(&session, "Please enter an invitation code"))
                .into_response(),
        );
    }

    let db = Db::new(state.backend.as_ref(), &session.access_token);
    match db.redeem_invitation(code).await {
        Ok(true) => {
            tracing::info!("User {} activated", session.user.id);
            Ok(Redirect::to("/").into_response())
        }
        Ok(false) => Ok(
            Html(ActivateTemplate::new(&session, "Invalid or used invitation code"))
                .into_response(),
        ),
        Err(e) => {
            tracing::error!("Invitation redemption failed for {}: {}", session.user.id, e);
            Ok(Html(ActivateTemplate::new(
                &session,
                "Could not verify the invitation code, please try again",
            ))
            .into_response())
        }
    }
}

// -- Logout handler --

/// POST /logout: end the session and go back to the login page.
pub async fn logout(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> AppResult<Response> {
    if let Some(session) = session {
        state.sessions.sign_out(&session.token).await;
    }

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/login".to_string()),
            (
                header::SET_COOKIE,
                clear_session_cookie(&state.config.auth.cookie_name),
            ),
        ],
        "",
    )
        .into_response())
}
