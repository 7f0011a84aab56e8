use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::backend::{AuthSession, AuthUser, Backend, BackendResult};

/// Refresh access tokens this long before they actually expire.
const REFRESH_MARGIN_SECS: i64 = 30;

/// How often sessions past their deadline are swept out.
const SWEEP_EVERY: std::time::Duration = std::time::Duration::from_secs(10 * 60);

/// A signed-in browser. `token` is the value of our session cookie; the
/// platform tokens never leave the server.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub user: AuthUser,
    pub expires_at: DateTime<Utc>,
    /// Absolute end of the browser session; refreshing tokens never moves it.
    pub ends_at: DateTime<Utc>,
}

impl Session {
    fn from_auth(token: String, auth: AuthSession, ends_at: DateTime<Utc>) -> Self {
        Self {
            token,
            ends_at,
            expires_at: Utc::now() + Duration::seconds(auth.expires_in),
            access_token: auth.access_token,
            refresh_token: auth.refresh_token,
            user: auth.user,
        }
    }

    fn needs_refresh(&self) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) <= Utc::now()
    }

    fn is_over(&self) -> bool {
        self.ends_at <= Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { token: String, user_id: String },
    TokenRefreshed { token: String, user_id: String },
    SignedOut { token: String, user_id: String },
    Shutdown,
}

/// Handle returned by [`SessionProvider::subscribe`].
pub struct Subscription {
    receiver: broadcast::Receiver<AuthEvent>,
}

impl Subscription {
    /// Next event, or `None` once the provider has shut down.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(AuthEvent::Shutdown) => return None,
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Auth subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

/// Owns every browser session for the lifetime of the app and broadcasts
/// sign-in, refresh and sign-out to subscribers.
pub struct SessionProvider {
    backend: Arc<dyn Backend>,
    sessions: RwLock<HashMap<String, Session>>,
    events: broadcast::Sender<AuthEvent>,
    lifetime: Duration,
}

impl SessionProvider {
    /// Sessions end `lifetime` after sign-in, however often they are used.
    pub fn init(backend: Arc<dyn Backend>, lifetime: Duration) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            backend,
            sessions: RwLock::new(HashMap::new()),
            events,
            lifetime,
        })
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.events.subscribe(),
        }
    }

    fn publish(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn store(&self, session: Session) {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.token.clone(), session);
    }

    fn take(&self, token: &str) -> Option<Session> {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token)
    }

    fn begin(&self, auth: AuthSession) -> Session {
        let session = Session::from_auth(generate_token(), auth, Utc::now() + self.lifetime);
        self.store(session.clone());
        tracing::info!("User {} signed in", session.user.id);
        self.publish(AuthEvent::SignedIn {
            token: session.token.clone(),
            user_id: session.user.id.clone(),
        });
        session
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> BackendResult<Session> {
        let auth = self.backend.sign_in_with_password(email, password).await?;
        Ok(self.begin(auth))
    }

    /// Register with the username defaulted to the e-mail's local part.
    pub async fn sign_up(&self, email: &str, password: &str) -> BackendResult<Session> {
        let username = email.split('@').next().unwrap_or(email);
        let auth = self.backend.sign_up(email, password, username).await?;
        Ok(self.begin(auth))
    }

    pub async fn sign_out(&self, token: &str) {
        let Some(session) = self.take(token) else {
            return;
        };
        tracing::info!("User {} signed out", session.user.id);
        self.end(session).await;
    }

    /// Revoke an already removed session at the platform and tell
    /// subscribers it is gone.
    async fn end(&self, session: Session) {
        if let Err(e) = self.backend.sign_out(&session.access_token).await {
            tracing::warn!("Backend sign-out failed for {}: {}", session.user.id, e);
        }
        self.publish(AuthEvent::SignedOut {
            token: session.token,
            user_id: session.user.id,
        });
    }

    /// Look up a session by cookie token, refreshing the platform tokens when
    /// they are about to expire. A session past its deadline or with a failed
    /// refresh is ended.
    pub async fn current(&self, token: &str) -> Option<Session> {
        let session = self
            .sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(token)
            .cloned()?;

        if session.is_over() {
            if let Some(session) = self.take(token) {
                tracing::info!("Session for {} expired", session.user.id);
                self.end(session).await;
            }
            return None;
        }

        if !session.needs_refresh() {
            return Some(session);
        }

        match self.backend.refresh_session(&session.refresh_token).await {
            Ok(auth) => {
                let refreshed = Session::from_auth(session.token.clone(), auth, session.ends_at);
                self.store(refreshed.clone());
                self.publish(AuthEvent::TokenRefreshed {
                    token: refreshed.token.clone(),
                    user_id: refreshed.user.id.clone(),
                });
                Some(refreshed)
            }
            Err(e) => {
                tracing::warn!("Session refresh failed for {}: {}", session.user.id, e);
                self.take(token);
                self.publish(AuthEvent::SignedOut {
                    token: session.token,
                    user_id: session.user.id,
                });
                None
            }
        }
    }

    /// End every session past its deadline. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let expired: Vec<Session> = {
            let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
            let tokens: Vec<String> = sessions
                .values()
                .filter(|s| s.is_over())
                .map(|s| s.token.clone())
                .collect();
            tokens
                .iter()
                .filter_map(|token| sessions.remove(token))
                .collect()
        };

        let count = expired.len();
        for session in expired {
            self.end(session).await;
        }
        if count > 0 {
            tracing::info!("Swept {} expired sessions", count);
        }
        count
    }

    /// Sweep expired sessions every few minutes until teardown.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let provider = Arc::clone(self);
        let mut events = self.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_EVERY);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        provider.sweep_expired().await;
                    }
                    event = events.recv() => {
                        if event.is_none() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Session sweeper stopped");
        })
    }

    /// Revoke every session at the platform and tell subscribers to stop.
    pub async fn teardown(&self) {
        let sessions: Vec<Session> = self
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, s)| s)
            .collect();
        for session in sessions {
            if let Err(e) = self.backend.sign_out(&session.access_token).await {
                tracing::warn!("Backend sign-out failed for {}: {}", session.user.id, e);
            }
        }
        self.publish(AuthEvent::Shutdown);
    }

    #[cfg(test)]
    fn expire(&self, token: &str) {
        if let Some(s) = self
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(token)
        {
            s.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}

/// Generate a cryptographically random 32-byte hex token.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn provider() -> (Arc<MemoryBackend>, Arc<SessionProvider>) {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .create_user("ann@example.com", "secret", "ann", false, true)
            .unwrap();
        let provider = SessionProvider::init(backend.clone(), Duration::hours(1));
        (backend, provider)
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[tokio::test]
    async fn sign_in_stores_session_and_notifies() {
        let (_backend, provider) = provider();
        let mut sub = provider.subscribe();

        let session = provider.sign_in("ann@example.com", "secret").await.unwrap();

        assert!(provider.current(&session.token).await.is_some());
        assert_eq!(
            sub.recv().await,
            Some(AuthEvent::SignedIn {
                token: session.token.clone(),
                user_id: session.user.id.clone(),
            })
        );
    }

    #[tokio::test]
    async fn bad_password_creates_no_session() {
        let (_backend, provider) = provider();
        assert!(provider.sign_in("ann@example.com", "wrong").await.is_err());
    }

    #[tokio::test]
    async fn sign_out_removes_session_and_revokes_token() {
        let (backend, provider) = provider();
        let session = provider.sign_in("ann@example.com", "secret").await.unwrap();
        let mut sub = provider.subscribe();

        provider.sign_out(&session.token).await;

        assert!(provider.current(&session.token).await.is_none());
        assert!(backend.get_user(&session.access_token).await.is_err());
        assert!(matches!(sub.recv().await, Some(AuthEvent::SignedOut { .. })));
    }

    #[tokio::test]
    async fn expired_session_is_refreshed() {
        let (_backend, provider) = provider();
        let session = provider.sign_in("ann@example.com", "secret").await.unwrap();
        provider.expire(&session.token);

        let refreshed = provider.current(&session.token).await.unwrap();

        assert_eq!(refreshed.token, session.token);
        assert_ne!(refreshed.access_token, session.access_token);
    }

    #[tokio::test]
    async fn teardown_ends_subscriptions() {
        let (_backend, provider) = provider();
        let session = provider.sign_in("ann@example.com", "secret").await.unwrap();
        let mut sub = provider.subscribe();

        provider.teardown().await;

        assert_eq!(sub.recv().await, None);
        assert!(provider.current(&session.token).await.is_none());
    }

    #[tokio::test]
    async fn sign_up_defaults_username_to_email_local_part() {
        let backend = Arc::new(MemoryBackend::new());
        let provider = SessionProvider::init(backend.clone(), Duration::hours(1));

        provider.sign_up("bob@example.com", "pw").await.unwrap();

        assert_eq!(backend.rows("profiles")[0]["username"], "bob");
    }

    #[tokio::test]
    async fn session_past_its_deadline_is_ended() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .create_user("ann@example.com", "secret", "ann", false, true)
            .unwrap();
        let provider = SessionProvider::init(backend.clone(), Duration::zero());
        let session = provider.sign_in("ann@example.com", "secret").await.unwrap();
        let mut sub = provider.subscribe();

        assert!(provider.current(&session.token).await.is_none());
        assert!(backend.get_user(&session.access_token).await.is_err());
        assert!(matches!(sub.recv().await, Some(AuthEvent::SignedOut { .. })));
        assert!(provider.current(&session.token).await.is_none());
    }

    #[tokio::test]
    async fn refresh_keeps_the_original_deadline() {
        let (_backend, provider) = provider();
        let session = provider.sign_in("ann@example.com", "secret").await.unwrap();
        provider.expire(&session.token);

        let refreshed = provider.current(&session.token).await.unwrap();

        assert_eq!(refreshed.ends_at, session.ends_at);
    }

    #[tokio::test]
    async fn sweep_removes_only_sessions_past_their_deadline() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .create_user("ann@example.com", "secret", "ann", false, true)
            .unwrap();
        let stale = SessionProvider::init(backend.clone(), Duration::zero());
        stale.sign_in("ann@example.com", "secret").await.unwrap();
        stale.sign_in("ann@example.com", "secret").await.unwrap();
        assert_eq!(stale.sweep_expired().await, 2);
        assert_eq!(stale.sweep_expired().await, 0);

        let (_backend, fresh) = provider();
        let session = fresh.sign_in("ann@example.com", "secret").await.unwrap();
        assert_eq!(fresh.sweep_expired().await, 0);
        assert!(fresh.current(&session.token).await.is_some());
    }
}
