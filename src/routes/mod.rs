pub mod assets;
pub mod auth;
pub mod create;
pub mod home;
pub mod icebreaker;
pub mod post;
pub mod profile;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Tags a post can carry; the feed filter offers exactly these.
pub const TAGS: &[&str] = &["fellowship", "birthday", "music", "outdoors", "other"];

pub fn is_known_tag(tag: &str) -> bool {
    TAGS.contains(&tag)
}

/// The full application router.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.body_limit();

    Router::new()
        .route("/assets/{*path}", get(assets::serve))
        .merge(auth::router())
        .merge(home::router())
        .merge(post::router())
        .merge(create::router())
        .merge(profile::router())
        .merge(icebreaker::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let diff = Utc::now().signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}
