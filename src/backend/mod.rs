//! Client-side view of the hosted backend platform.
//!
//! Everything the app persists goes through [`Backend`]: password auth,
//! table queries, one RPC, and object storage. [`rest::RestBackend`] speaks
//! the platform's REST API; [`memory::MemoryBackend`] is an in-process
//! stand-in used for local development and tests.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use self::memory::MemoryBackend;
pub use self::rest::RestBackend;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Auth(String),

    #[error("Not authorized")]
    Unauthorized,

    #[error("Row not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid row: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Decode(e.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// The identity the platform's auth service hands back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
}

/// Tokens plus user, as returned by sign-in, sign-up and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    pub user: AuthUser,
}

fn default_expires_in() -> i64 {
    3600
}

/// Storage buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Photos,
    Avatars,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Photos => "photos",
            Bucket::Avatars => "avatars",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Filter/order/limit query against one table.
///
/// `select` uses the platform's column syntax, including embedded relations
/// such as `*, profiles(username, avatar_url)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub select: String,
    pub filters: Vec<(String, Value)>,
    pub order: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            select: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Operations the app needs from the hosted platform.
///
/// `token` is the caller's access token; the platform applies its row-level
/// policies based on it.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, username: &str)
        -> BackendResult<AuthSession>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> BackendResult<AuthSession>;

    async fn refresh_session(&self, refresh_token: &str) -> BackendResult<AuthSession>;

    async fn sign_out(&self, token: &str) -> BackendResult<()>;

    async fn get_user(&self, token: &str) -> BackendResult<AuthUser>;

    async fn select(&self, token: &str, query: &Query) -> BackendResult<Vec<Value>>;

    async fn count(&self, token: &str, query: &Query) -> BackendResult<u64>;

    async fn insert(&self, token: &str, table: &str, row: Value) -> BackendResult<Vec<Value>>;

    async fn update(&self, token: &str, query: &Query, patch: Value) -> BackendResult<Vec<Value>>;

    async fn delete(&self, token: &str, query: &Query) -> BackendResult<()>;

    async fn rpc(&self, token: &str, function: &str, args: Value) -> BackendResult<Value>;

    async fn upload(
        &self,
        token: &str,
        bucket: Bucket,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> BackendResult<()>;

    fn public_url(&self, bucket: Bucket, key: &str) -> String;
}

/// Privileged user management, only used by the maintenance command.
#[async_trait]
pub trait UserAdmin: Send + Sync {
    async fn list_users(&self) -> BackendResult<Vec<AuthUser>>;

    async fn create_confirmed_user(&self, email: &str, password: &str) -> BackendResult<AuthUser>;

    async fn confirm_email(&self, user_id: &str) -> BackendResult<AuthUser>;
}

/// Render a filter value the way the platform's query string expects it.
pub(crate) fn filter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
