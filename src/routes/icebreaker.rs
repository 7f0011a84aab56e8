use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::icebreaker::{Card, FlipOutcome, IcebreakerGame};
use crate::routes::home::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/icebreaker.html")]
pub struct IcebreakerTemplate {
    pub grid: String,
}

#[derive(Template)]
#[template(path = "components/icebreaker_grid.html")]
pub struct GridTemplate {
    pub cards: Vec<Card>,
    pub resetting: bool,
}

impl GridTemplate {
    fn of(game: &IcebreakerGame) -> Self {
        Self {
            cards: game.cards(),
            resetting: game.is_resetting(),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/icebreaker", get(icebreaker_page))
        .route("/icebreaker/cards/{id}/flip", post(flip_card))
        .route("/icebreaker/reset", post(reset))
}

fn new_game(state: &AppState) -> IcebreakerGame {
    IcebreakerGame::new(
        &state.config.icebreaker.questions,
        Duration::from_millis(state.config.icebreaker.reset_delay_ms),
    )
}

/// The viewer's current game, dealing one if there is none.
fn current_game(state: &AppState, user: &CurrentUser) -> Arc<IcebreakerGame> {
    state
        .views
        .icebreaker(&user.session_token)
        .unwrap_or_else(|| {
            state
                .views
                .start_icebreaker(&user.session_token, new_game(state))
        })
}

/// GET /icebreaker: every visit deals a freshly shuffled deck.
async fn icebreaker_page(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let game = state
        .views
        .start_icebreaker(&user.session_token, new_game(&state));
    let grid = GridTemplate::of(&game)
        .render()
        .map_err(|e| AppError::Internal(format!("Template render error: {}", e)))?;
    Ok(Html(IcebreakerTemplate { grid }).into_response())
}

async fn flip_card(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<usize>,
) -> Html<GridTemplate> {
    let game = current_game(&state, &user);
    match game.flip(id) {
        FlipOutcome::Flipped => {}
        outcome => tracing::debug!("Flip of card {} ignored: {:?}", id, outcome),
    }
    Html(GridTemplate::of(&game))
}

/// POST /icebreaker/reset: returns once the deck has been reshuffled.
async fn reset(State(state): State<AppState>, user: CurrentUser) -> Html<GridTemplate> {
    let game = current_game(&state, &user);
    let outcome = game.reset().await;
    tracing::debug!("Icebreaker reset: {:?}", outcome);
    Html(GridTemplate::of(&game))
}
