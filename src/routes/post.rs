use askama::Template;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::backend::{BackendError, Bucket};
use crate::db::models::CommentWithAuthor;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::interaction::LikeToggle;
use crate::routes::format_relative_time;
use crate::routes::home::{load_likes, Html, LikeButtonTemplate, PostCard};
use crate::state::AppState;

const MAX_COMMENT_CHARS: usize = 500;

// --- View structs ---

pub struct CommentView {
    pub author_name: String,
    pub author_initial: String,
    pub author_avatar: String,
    pub text: String,
    pub created_at: String,
}

impl CommentView {
    fn new(state: &AppState, comment: CommentWithAuthor) -> Self {
        let author = comment.author.unwrap_or_default();
        Self {
            author_name: author.display_name().to_string(),
            author_initial: author.initial(),
            author_avatar: author
                .avatar_url
                .as_deref()
                .map(|url| {
                    crate::db::resolve_image_url(state.backend.as_ref(), Bucket::Avatars, url)
                })
                .unwrap_or_default(),
            text: comment.comment.text,
            created_at: format_relative_time(&comment.comment.created_at),
        }
    }
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub post: PostCard,
    pub comments: Vec<CommentView>,
    pub comment_text: String,
    pub error: String,
}

#[derive(Template)]
#[template(path = "pages/not_found.html")]
pub struct NotFoundTemplate {
    pub message: String,
}

// --- Forms ---

#[derive(Deserialize)]
pub struct CommentForm {
    pub text: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/{id}", get(post_page))
        .route("/post/{id}/like", post(toggle_like))
        .route("/post/{id}/comments", post(create_comment))
        .route("/post/{id}/delete", post(delete_post))
}

// --- Handlers ---

async fn post_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    render_post(&state, &user, &id, String::new(), String::new()).await
}

/// POST /post/{id}/like: toggle the viewer's like and return the button.
/// Failures roll the button back; they are never reported to the viewer.
async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let card = match state.views.like(&user.session_token, &id) {
        Some(card) => card,
        None => {
            let toggle = LikeToggle::load(state.db(&user), &id, &user.id).await?;
            state.views.put_like(&user.session_token, toggle)
        }
    };

    let outcome = card.toggle(state.db(&user)).await;
    Ok(Html(LikeButtonTemplate::new(&id, outcome.state())).into_response())
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let text = form.text.trim().to_string();
    if text.is_empty() {
        return render_post(&state, &user, &id, text, "Comment cannot be empty".into()).await;
    }
    if text.chars().count() > MAX_COMMENT_CHARS {
        return render_post(
            &state,
            &user,
            &id,
            text,
            format!("Comment must be {} characters or less", MAX_COMMENT_CHARS),
        )
        .await;
    }

    if let Err(e) = state.db(&user).add_comment(&id, &user.id, &text).await {
        tracing::error!("Error adding comment to {}: {}", id, e);
        return render_post(
            &state,
            &user,
            &id,
            text,
            "Could not post your comment, please try again".into(),
        )
        .await;
    }

    Ok(Redirect::to(&format!("/post/{}", id)).into_response())
}

/// POST /post/{id}/delete: owners and admins only.
async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let db = state.db(&user);
    let post = db.get_post(&id).await.map_err(|e| match e {
        BackendError::NotFound => AppError::NotFound,
        e => e.into(),
    })?;

    if post.post.user_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden);
    }

    db.delete_post(&id).await?;
    state.views.forget_like(&user.session_token, &id);
    tracing::info!("Post {} deleted by {}", id, user.username());

    Ok(Redirect::to("/").into_response())
}

async fn render_post(
    state: &AppState,
    user: &CurrentUser,
    id: &str,
    comment_text: String,
    error: String,
) -> AppResult<Response> {
    let db = state.db(user);

    let post = match db.get_post(id).await {
        Ok(post) => post,
        Err(BackendError::NotFound) => {
            return Ok((
                StatusCode::NOT_FOUND,
                Html(NotFoundTemplate {
                    message: "Post not found".to_string(),
                }),
            )
                .into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let (likes, comments) = tokio::try_join!(
        load_likes(state, user, std::iter::once(id)),
        async { db.list_comments(id).await.map_err(AppError::from) },
    )?;
    let like = likes
        .first()
        .map(|card| card.state())
        .unwrap_or_default();

    Ok(Html(PostTemplate {
        post: PostCard::new(state, user, post, like),
        comments: comments
            .into_iter()
            .map(|c| CommentView::new(state, c))
            .collect(),
        comment_text,
        error,
    })
    .into_response())
}
