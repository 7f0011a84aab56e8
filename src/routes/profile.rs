use askama::Template;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;

use crate::backend::Bucket;
use crate::db::models::Post;
use crate::db::ProfileUpdate;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::create::MultipartForm;
use crate::routes::home::Html;
use crate::state::AppState;
use crate::upload::object_key;

const MAX_USERNAME_CHARS: usize = 30;

pub struct PostTile {
    pub id: String,
    pub image_url: String,
    pub caption: String,
}

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub username: String,
    pub email: String,
    pub initial: String,
    pub avatar_url: String,
    pub is_admin: bool,
    pub posts: Vec<PostTile>,
    pub error: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/profile", get(profile_page).post(update_profile))
}

async fn profile_page(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    render_profile(&state, &user, user.username().to_string(), String::new(), StatusCode::OK).await
}

/// POST /profile: change the username and, optionally, the avatar.
async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = MultipartForm::read(multipart, "avatar").await?;
    let username = form.text("username");

    if username.is_empty() {
        return render_profile(
            &state,
            &user,
            username,
            "Username cannot be empty".into(),
            StatusCode::BAD_REQUEST,
        )
        .await;
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return render_profile(
            &state,
            &user,
            username,
            format!("Username must be {} characters or less", MAX_USERNAME_CHARS),
            StatusCode::BAD_REQUEST,
        )
        .await;
    }

    let db = state.db(&user);
    let mut avatar_url = user.profile.avatar_url.clone();

    if let Some(avatar) = form.file.as_ref() {
        if let Err(e) = avatar.validate(state.config.upload.max_bytes) {
            return render_profile(&state, &user, username, e.to_string(), StatusCode::BAD_REQUEST)
                .await;
        }
        let key = object_key(&user.id, Utc::now().timestamp_millis(), &avatar.extension());
        if let Err(e) = db
            .upload(Bucket::Avatars, &key, avatar.data.clone(), &avatar.content_type)
            .await
        {
            tracing::error!("Error uploading avatar {}: {}", key, e);
            return render_profile(
                &state,
                &user,
                username,
                "Could not upload the avatar, please try again".into(),
                StatusCode::BAD_GATEWAY,
            )
            .await;
        }
        avatar_url = Some(db.image_url(Bucket::Avatars, &key));
    }

    let update = ProfileUpdate {
        username: username.clone(),
        avatar_url,
    };
    if let Err(e) = db.update_profile(&user.id, &update).await {
        tracing::error!("Error updating profile {}: {}", user.id, e);
        return render_profile(
            &state,
            &user,
            username,
            "Could not save your profile, please try again".into(),
            StatusCode::BAD_GATEWAY,
        )
        .await;
    }

    tracing::info!("Profile {} updated", user.id);
    Ok(Redirect::to("/profile").into_response())
}

async fn render_profile(
    state: &AppState,
    user: &CurrentUser,
    username: String,
    mut error: String,
    status: StatusCode,
) -> AppResult<Response> {
    let posts = match state.db(user).posts_by_user(&user.id).await {
        Ok(posts) => posts.into_iter().map(|p| tile(state, p)).collect(),
        Err(e) => {
            tracing::error!("Error fetching posts for {}: {}", user.id, e);
            if error.is_empty() {
                error = "Could not load your posts".to_string();
            }
            Vec::new()
        }
    };

    let avatar_url = user
        .profile
        .avatar_url
        .as_deref()
        .map(|url| crate::db::resolve_image_url(state.backend.as_ref(), Bucket::Avatars, url))
        .unwrap_or_default();

    Ok((
        status,
        Html(ProfileTemplate {
            initial: username
                .chars()
                .next()
                .map(|c| c.to_uppercase().collect())
                .unwrap_or_else(|| "U".to_string()),
            username,
            email: user.email.clone().unwrap_or_default(),
            avatar_url,
            is_admin: user.is_admin(),
            posts,
            error,
        }),
    )
        .into_response())
}

fn tile(state: &AppState, post: Post) -> PostTile {
    PostTile {
        image_url: crate::db::resolve_image_url(
            state.backend.as_ref(),
            Bucket::Photos,
            &post.image_url,
        ),
        id: post.id,
        caption: post.caption,
    }
}
