//! Per-browser interaction state: one like card per post the viewer has
//! seen, and the viewer's current icebreaker game.
//!
//! Everything is keyed by session token and dropped when the session ends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use crate::auth::session::{AuthEvent, Subscription};
use crate::icebreaker::IcebreakerGame;
use crate::interaction::LikeToggle;

#[derive(Default)]
struct SessionViews {
    likes: HashMap<String, Arc<LikeToggle>>,
    icebreaker: Option<Arc<IcebreakerGame>>,
}

#[derive(Default)]
pub struct ViewStore {
    sessions: Mutex<HashMap<String, SessionViews>>,
}

impl ViewStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionViews>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install a freshly loaded card. A card with a toggle still in flight is
    /// kept so its guard keeps serializing toggles.
    pub fn put_like(&self, session: &str, card: LikeToggle) -> Arc<LikeToggle> {
        let mut sessions = self.lock();
        let likes = &mut sessions.entry(session.to_string()).or_default().likes;
        if let Some(existing) = likes.get(card.post_id()).filter(|c| c.is_busy()) {
            return existing.clone();
        }
        let card = Arc::new(card);
        likes.insert(card.post_id().to_string(), card.clone());
        card
    }

    pub fn like(&self, session: &str, post_id: &str) -> Option<Arc<LikeToggle>> {
        self.lock()
            .get(session)
            .and_then(|views| views.likes.get(post_id).cloned())
    }

    pub fn forget_like(&self, session: &str, post_id: &str) {
        if let Some(views) = self.lock().get_mut(session) {
            views.likes.remove(post_id);
        }
    }

    /// Replace the viewer's game with a new one.
    pub fn start_icebreaker(&self, session: &str, game: IcebreakerGame) -> Arc<IcebreakerGame> {
        let game = Arc::new(game);
        self.lock()
            .entry(session.to_string())
            .or_default()
            .icebreaker = Some(game.clone());
        game
    }

    pub fn icebreaker(&self, session: &str) -> Option<Arc<IcebreakerGame>> {
        self.lock()
            .get(session)
            .and_then(|views| views.icebreaker.clone())
    }

    pub fn drop_session(&self, session: &str) {
        self.lock().remove(session);
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    /// Drop a viewer's state as soon as their session ends.
    pub fn attach(self: &Arc<Self>, mut events: Subscription) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let AuthEvent::SignedOut { token, .. } = event {
                    store.drop_session(&token);
                }
            }
            events.unsubscribe();
            tracing::debug!("View store detached from session events");
        })
    }
}
