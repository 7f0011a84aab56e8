use std::sync::Arc;

use crate::auth::session::SessionProvider;
use crate::backend::Backend;
use crate::config::Config;
use crate::db::Db;
use crate::extractors::CurrentUser;
use crate::views::ViewStore;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub sessions: Arc<SessionProvider>,
    pub views: Arc<ViewStore>,
    pub config: Config,
}

impl AppState {
    /// Build the state and wire the view store to session events. Must be
    /// called inside a Tokio runtime.
    pub fn new(backend: Arc<dyn Backend>, config: Config) -> Self {
        let lifetime = chrono::Duration::hours(config.auth.session_hours as i64);
        let sessions = SessionProvider::init(backend.clone(), lifetime);
        sessions.spawn_sweeper();
        let views = ViewStore::new();
        views.attach(sessions.subscribe());
        Self {
            backend,
            sessions,
            views,
            config,
        }
    }

    /// Data access on behalf of `user`.
    pub fn db<'a>(&'a self, user: &'a CurrentUser) -> Db<'a> {
        Db::new(self.backend.as_ref(), &user.access_token)
    }
}
