use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::session::Session;
use crate::backend::BackendError;
use crate::db::models::Profile;
use crate::db::Db;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated, activated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub session_token: String,
    pub access_token: String,
    pub id: String,
    pub email: Option<String>,
    pub profile: Profile,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.profile.is_admin
    }

    pub fn username(&self) -> &str {
        self.profile.display_name()
    }
}

/// Extractor that requires a session and an activated profile.
/// Redirects to /login otherwise.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybeSession(session) = MaybeSession::from_request_parts(parts, state).await?;
        let session = session.ok_or(AppError::LoginRequired)?;

        let db = Db::new(state.backend.as_ref(), &session.access_token);
        let profile = match db.get_profile(&session.user.id).await {
            Ok(profile) => profile,
            Err(BackendError::NotFound) => return Err(AppError::ActivationPending),
            Err(e) => {
                tracing::error!("Error fetching profile for {}: {}", session.user.id, e);
                return Err(e.into());
            }
        };
        if !profile.is_activated {
            return Err(AppError::ActivationPending);
        }

        Ok(CurrentUser {
            session_token: session.token,
            access_token: session.access_token,
            id: session.user.id,
            email: session.user.email,
            profile,
        })
    }
}

/// Optional session extractor: `None` instead of a redirect when signed out.
/// Does not look at activation.
pub struct MaybeSession(pub Option<Session>);

impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_session_token(parts, &state.config.auth.cookie_name) else {
            return Ok(MaybeSession(None));
        };
        Ok(MaybeSession(state.sessions.current(token).await))
    }
}

pub fn extract_session_token<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}
