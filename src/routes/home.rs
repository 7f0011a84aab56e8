use std::sync::Arc;

use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use futures::future::try_join_all;
use serde::Deserialize;

use crate::backend::Bucket;
use crate::db::models::PostWithAuthor;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::interaction::{LikeState, LikeToggle};
use crate::routes::{format_relative_time, is_known_tag, TAGS};
use crate::state::AppState;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

// --- View structs ---

pub struct PostCard {
    pub id: String,
    pub image_url: String,
    pub caption: String,
    pub tag: String,
    pub author_name: String,
    pub author_initial: String,
    pub author_avatar: String,
    pub created_at: String,
    pub can_delete: bool,
    pub like_button: String,
}

impl PostCard {
    pub fn new(state: &AppState, user: &CurrentUser, post: PostWithAuthor, like: LikeState) -> Self {
        let author = post.author.unwrap_or_default();
        let post = post.post;
        Self {
            image_url: crate::db::resolve_image_url(
                state.backend.as_ref(),
                Bucket::Photos,
                &post.image_url,
            ),
            caption: post.caption,
            tag: post.tag.unwrap_or_default(),
            author_name: author.display_name().to_string(),
            author_initial: author.initial(),
            author_avatar: author
                .avatar_url
                .as_deref()
                .map(|url| {
                    crate::db::resolve_image_url(state.backend.as_ref(), Bucket::Avatars, url)
                })
                .unwrap_or_default(),
            created_at: format_relative_time(&post.created_at),
            can_delete: post.user_id == user.id || user.is_admin(),
            like_button: render_like_button(&post.id, like),
            id: post.id,
        }
    }
}

pub struct TagChip {
    pub label: String,
    pub href: String,
    pub selected: bool,
}

fn tag_chips(selected: Option<&str>) -> Vec<TagChip> {
    let mut chips = vec![TagChip {
        label: "all".to_string(),
        href: "/".to_string(),
        selected: selected.is_none(),
    }];
    chips.extend(TAGS.iter().map(|tag| TagChip {
        label: tag.to_string(),
        href: format!("/?tag={}", tag),
        selected: selected == Some(*tag),
    }));
    chips
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/feed.html")]
pub struct FeedTemplate {
    pub posts: Vec<PostCard>,
    pub tags: Vec<TagChip>,
    pub theme: String,
    pub is_admin: bool,
    pub empty_message: String,
    pub error: String,
}

#[derive(Template)]
#[template(path = "components/like_button.html")]
pub struct LikeButtonTemplate {
    pub post_id: String,
    pub liked: bool,
    pub label: String,
}

impl LikeButtonTemplate {
    pub fn new(post_id: &str, like: LikeState) -> Self {
        Self {
            post_id: post_id.to_string(),
            liked: like.liked,
            label: like.label(),
        }
    }
}

pub fn render_like_button(post_id: &str, like: LikeState) -> String {
    LikeButtonTemplate::new(post_id, like)
        .render()
        .unwrap_or_else(|e| {
            tracing::error!("Template render error: {}", e);
            String::new()
        })
}

// --- Forms ---

#[derive(Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Deserialize)]
pub struct ThemeForm {
    pub content: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(feed))
        .route("/theme", post(publish_theme))
}

// --- Handlers ---

async fn feed(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<FeedQuery>,
) -> AppResult<Html<FeedTemplate>> {
    let tag = query.tag.as_deref().filter(|t| is_known_tag(t));
    render_feed(&state, &user, tag, String::new()).await
}

/// POST /theme: publish this week's theme (admins only).
async fn publish_theme(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<ThemeForm>,
) -> AppResult<Response> {
    if !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    let content = form.content.trim();
    if content.is_empty() {
        return Ok(render_feed(&state, &user, None, "Theme cannot be empty".into())
            .await?
            .into_response());
    }

    if let Err(e) = state.db(&user).create_theme(content, &user.id).await {
        tracing::error!("Error publishing theme: {}", e);
        return Ok(render_feed(
            &state,
            &user,
            None,
            "Could not publish the theme, please try again".into(),
        )
        .await?
        .into_response());
    }

    tracing::info!("{} published a new weekly theme", user.username());
    Ok(Redirect::to("/").into_response())
}

async fn render_feed(
    state: &AppState,
    user: &CurrentUser,
    tag: Option<&str>,
    mut error: String,
) -> AppResult<Html<FeedTemplate>> {
    let db = state.db(user);

    let theme = match db.latest_theme().await {
        Ok(theme) => theme.map(|t| t.content).unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Error fetching weekly theme: {}", e);
            String::new()
        }
    };

    let posts = match db.list_posts(tag).await {
        Ok(posts) => load_cards(state, user, posts).await?,
        Err(e) => {
            tracing::error!("Error fetching posts: {}", e);
            if error.is_empty() {
                error = "Could not load posts, please try again".to_string();
            }
            Vec::new()
        }
    };

    let empty_message = match tag {
        Some(tag) => format!("No {} posts yet.", tag),
        None => "No posts yet. Be the first to share a moment!".to_string(),
    };

    Ok(Html(FeedTemplate {
        posts,
        tags: tag_chips(tag),
        theme,
        is_admin: user.is_admin(),
        empty_message,
        error,
    }))
}

/// Load like state for every post and install a fresh card per post in the
/// viewer's view state.
pub async fn load_cards(
    state: &AppState,
    user: &CurrentUser,
    posts: Vec<PostWithAuthor>,
) -> AppResult<Vec<PostCard>> {
    let cards = load_likes(state, user, posts.iter().map(|p| p.post.id.as_str())).await?;
    Ok(posts
        .into_iter()
        .zip(cards)
        .map(|(post, card)| PostCard::new(state, user, post, card.state()))
        .collect())
}

pub async fn load_likes<'a>(
    state: &AppState,
    user: &CurrentUser,
    post_ids: impl Iterator<Item = &'a str>,
) -> AppResult<Vec<Arc<LikeToggle>>> {
    let db = state.db(user);
    let toggles = try_join_all(post_ids.map(|id| LikeToggle::load(db, id, &user.id))).await?;
    Ok(toggles
        .into_iter()
        .map(|toggle| state.views.put_like(&user.session_token, toggle))
        .collect())
}
