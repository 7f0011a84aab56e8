//! In-process stand-in for the hosted platform.
//!
//! Holds tables as JSON rows and mimics the pieces of the platform the app
//! relies on: password auth with bearer tokens, a profile row created on
//! sign-up, embedded `profiles(...)` selects, the `(post_id, user_id)`
//! uniqueness constraint on likes, cascading post deletes, simple ownership
//! policies, the `redeem_invitation` RPC and object storage.
//!
//! Tests can make writes to a table fail or stall, and inspect the call log.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use super::{
    filter_value, AuthSession, AuthUser, Backend, BackendError, BackendResult, Bucket, Direction,
    Query, UserAdmin,
};
use crate::auth::session::generate_token;

const HASH_COST: u32 = 4;
const PUBLIC_BASE: &str = "http://memory.local";

struct StoredUser {
    user: AuthUser,
    password_hash: String,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, StoredUser>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    tables: HashMap<String, Vec<Value>>,
    objects: HashMap<(String, String), (Bytes, String)>,
    invitations: HashSet<String>,
    failing_tables: HashSet<String>,
    write_latency: Option<Duration>,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

enum Column {
    All,
    Plain(String),
    Embed { table: String, columns: Vec<Column> },
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invitation_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::new();
        for code in codes {
            backend.add_invitation(code);
        }
        backend
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_invitation(&self, code: impl Into<String>) {
        self.lock().invitations.insert(code.into());
    }

    /// Register a user with a profile and return a signed-in session.
    pub fn create_user(
        &self,
        email: &str,
        password: &str,
        username: &str,
        is_admin: bool,
        is_activated: bool,
    ) -> BackendResult<AuthSession> {
        let password_hash = bcrypt::hash(password, HASH_COST)
            .map_err(|e| BackendError::Auth(format!("could not hash password: {}", e)))?;

        let mut inner = self.lock();
        if inner
            .users
            .values()
            .any(|u| u.user.email.as_deref() == Some(email))
        {
            return Err(BackendError::Auth("User already registered".into()));
        }

        let id = uuid::Uuid::now_v7().to_string();
        let user = AuthUser {
            id: id.clone(),
            email: Some(email.to_string()),
            email_confirmed_at: None,
        };
        inner.users.insert(
            id.clone(),
            StoredUser {
                user: user.clone(),
                password_hash,
            },
        );
        inner.tables.entry("profiles".into()).or_default().push(json!({
            "id": id,
            "username": username,
            "avatar_url": null,
            "is_admin": is_admin,
            "is_activated": is_activated,
            "created_at": now(),
        }));
        Ok(issue_session(&mut inner, user))
    }

    /// Insert a row as-is, bypassing policies and constraints.
    pub fn seed_row(&self, table: &str, row: Value) {
        self.lock().tables.entry(table.into()).or_default().push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn object(&self, bucket: Bucket, key: &str) -> Option<Bytes> {
        self.lock()
            .objects
            .get(&(bucket.as_str().to_string(), key.to_string()))
            .map(|(data, _)| data.clone())
    }

    /// Make every insert, update and delete on `table` fail.
    pub fn fail_writes(&self, table: &str) {
        self.lock().failing_tables.insert(table.to_string());
    }

    pub fn clear_failures(&self) {
        self.lock().failing_tables.clear();
    }

    /// Delay every write and upload by `latency` before it is applied.
    pub fn set_write_latency(&self, latency: Option<Duration>) {
        self.lock().write_latency = latency;
    }

    /// Log of operations performed, e.g. `insert likes` or `upload photos/u1/1.jpg`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Record the call, wait out any configured latency, then check for an
    /// injected failure.
    async fn begin_write(&self, table: &str, call: String) -> BackendResult<()> {
        let latency = {
            let mut inner = self.lock();
            inner.calls.push(call);
            inner.write_latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.lock().failing_tables.contains(table) {
            return Err(BackendError::Status {
                status: 503,
                message: format!("simulated failure writing {}", table),
            });
        }
        Ok(())
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn issue_session(inner: &mut Inner, user: AuthUser) -> AuthSession {
    let access_token = generate_token();
    let refresh_token = generate_token();
    inner
        .access_tokens
        .insert(access_token.clone(), user.id.clone());
    inner
        .refresh_tokens
        .insert(refresh_token.clone(), user.id.clone());
    AuthSession {
        access_token,
        refresh_token,
        expires_in: 3600,
        user,
    }
}

fn caller(inner: &Inner, token: &str) -> BackendResult<String> {
    inner
        .access_tokens
        .get(token)
        .cloned()
        .ok_or(BackendError::Unauthorized)
}

fn is_admin(inner: &Inner, user_id: &str) -> bool {
    inner
        .tables
        .get("profiles")
        .and_then(|rows| {
            rows.iter()
                .find(|p| p.get("id").and_then(Value::as_str) == Some(user_id))
        })
        .and_then(|p| p.get("is_admin").and_then(Value::as_bool))
        .unwrap_or(false)
}

/// Column naming the row's owner, for the ownership policies.
fn owner_column(table: &str) -> &'static str {
    match table {
        "profiles" => "id",
        "weekly_themes" => "created_by",
        _ => "user_id",
    }
}

fn owned_by(row: &Value, table: &str, user_id: &str) -> bool {
    row.get(owner_column(table)).and_then(Value::as_str) == Some(user_id)
}

fn matches(row: &Value, filters: &[(String, Value)]) -> bool {
    filters.iter().all(|(column, expected)| {
        row.get(column).map(filter_value) == Some(filter_value(expected))
    })
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal),
        (Some(x), Some(y)) => filter_value(x).cmp(&filter_value(y)),
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

/// Split on commas that are not inside parentheses.
fn split_top_level(select: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in select.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_select(select: &str) -> Vec<Column> {
    split_top_level(select)
        .into_iter()
        .map(|part| {
            if part == "*" {
                Column::All
            } else if let (Some(open), true) = (part.find('('), part.ends_with(')')) {
                Column::Embed {
                    table: part[..open].trim().to_string(),
                    columns: parse_select(&part[open + 1..part.len() - 1]),
                }
            } else {
                Column::Plain(part)
            }
        })
        .collect()
}

fn project(inner: &Inner, row: &Value, columns: &[Column]) -> Value {
    let mut out = Map::new();
    for column in columns {
        match column {
            Column::All => {
                if let Value::Object(fields) = row {
                    out.extend(fields.clone());
                }
            }
            Column::Plain(name) => {
                out.insert(name.clone(), row.get(name).cloned().unwrap_or(Value::Null));
            }
            Column::Embed { table, columns } => {
                let related = row.get("user_id").and_then(|id| {
                    inner.tables.get(table).and_then(|rows| {
                        rows.iter()
                            .find(|r| r.get("id").map(filter_value) == Some(filter_value(id)))
                    })
                });
                let embedded = related
                    .map(|r| project(inner, r, columns))
                    .unwrap_or(Value::Null);
                out.insert(table.clone(), embedded);
            }
        }
    }
    Value::Object(out)
}

fn run_query(inner: &Inner, query: &Query) -> Vec<Value> {
    let mut rows: Vec<Value> = inner
        .tables
        .get(&query.table)
        .map(|rows| {
            rows.iter()
                .filter(|row| matches(row, &query.filters))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    if let Some((column, direction)) = &query.order {
        rows.sort_by(|a, b| {
            let ord = compare(a.get(column), b.get(column));
            match direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        });
    }
    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }
    rows
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> BackendResult<AuthSession> {
        self.lock().calls.push("sign_up".into());
        self.create_user(email, password, username, false, false)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> BackendResult<AuthSession> {
        let mut inner = self.lock();
        inner.calls.push("sign_in".into());
        let stored = inner
            .users
            .values()
            .find(|u| u.user.email.as_deref() == Some(email))
            .ok_or_else(|| BackendError::Auth("Invalid login credentials".into()))?;
        if !bcrypt::verify(password, &stored.password_hash).unwrap_or(false) {
            return Err(BackendError::Auth("Invalid login credentials".into()));
        }
        let user = stored.user.clone();
        Ok(issue_session(&mut inner, user))
    }

    async fn refresh_session(&self, refresh_token: &str) -> BackendResult<AuthSession> {
        let mut inner = self.lock();
        let user_id = inner
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| BackendError::Auth("Invalid refresh token".into()))?;
        let user = inner
            .users
            .get(&user_id)
            .map(|u| u.user.clone())
            .ok_or(BackendError::Unauthorized)?;
        Ok(issue_session(&mut inner, user))
    }

    async fn sign_out(&self, token: &str) -> BackendResult<()> {
        let mut inner = self.lock();
        inner.calls.push("sign_out".into());
        if let Some(user_id) = inner.access_tokens.remove(token) {
            inner.refresh_tokens.retain(|_, owner| *owner != user_id);
        }
        Ok(())
    }

    async fn get_user(&self, token: &str) -> BackendResult<AuthUser> {
        let inner = self.lock();
        let user_id = caller(&inner, token)?;
        inner
            .users
            .get(&user_id)
            .map(|u| u.user.clone())
            .ok_or(BackendError::Unauthorized)
    }

    async fn select(&self, _token: &str, query: &Query) -> BackendResult<Vec<Value>> {
        let mut inner = self.lock();
        inner.calls.push(format!("select {}", query.table));
        let columns = parse_select(&query.select);
        let rows = run_query(&inner, query);
        Ok(rows.iter().map(|row| project(&inner, row, &columns)).collect())
    }

    async fn count(&self, _token: &str, query: &Query) -> BackendResult<u64> {
        let mut inner = self.lock();
        inner.calls.push(format!("count {}", query.table));
        Ok(run_query(&inner, query).len() as u64)
    }

    async fn insert(&self, token: &str, table: &str, row: Value) -> BackendResult<Vec<Value>> {
        self.begin_write(table, format!("insert {}", table)).await?;

        let mut inner = self.lock();
        let user_id = caller(&inner, token)?;
        let admin = is_admin(&inner, &user_id);

        let Value::Object(mut fields) = row else {
            return Err(BackendError::Decode("insert expects an object".into()));
        };
        let owner = owner_column(table);
        if let Some(claimed) = fields.get(owner).and_then(Value::as_str) {
            if claimed != user_id && !admin {
                return Err(BackendError::Unauthorized);
            }
        }
        if table == "weekly_themes" && !admin {
            return Err(BackendError::Unauthorized);
        }

        if table == "likes" || table == "comments" {
            let post_id = fields.get("post_id").cloned().unwrap_or(Value::Null);
            let post_exists = inner
                .tables
                .get("posts")
                .map(|posts| {
                    posts
                        .iter()
                        .any(|p| p.get("id").map(filter_value) == Some(filter_value(&post_id)))
                })
                .unwrap_or(false);
            if !post_exists {
                return Err(BackendError::Conflict(format!(
                    "insert on {} violates foreign key post_id",
                    table
                )));
            }
        }

        if table == "likes" {
            let pair = [
                ("post_id".to_string(), fields.get("post_id").cloned().unwrap_or(Value::Null)),
                ("user_id".to_string(), fields.get("user_id").cloned().unwrap_or(Value::Null)),
            ];
            let duplicate = inner
                .tables
                .get("likes")
                .map(|likes| likes.iter().any(|l| matches(l, &pair)))
                .unwrap_or(false);
            if duplicate {
                return Err(BackendError::Conflict(
                    "duplicate key value violates unique constraint likes_post_id_user_id_key"
                        .into(),
                ));
            }
        } else {
            fields
                .entry("id")
                .or_insert_with(|| Value::String(uuid::Uuid::now_v7().to_string()));
        }
        fields
            .entry("created_at")
            .or_insert_with(|| Value::String(now()));

        let stored = Value::Object(fields);
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .push(stored.clone());
        Ok(vec![stored])
    }

    async fn update(&self, token: &str, query: &Query, patch: Value) -> BackendResult<Vec<Value>> {
        self.begin_write(&query.table, format!("update {}", query.table))
            .await?;

        let mut inner = self.lock();
        let user_id = caller(&inner, token)?;
        let admin = is_admin(&inner, &user_id);
        let Value::Object(patch) = patch else {
            return Err(BackendError::Decode("update expects an object".into()));
        };

        let table = query.table.clone();
        let mut updated = Vec::new();
        if let Some(rows) = inner.tables.get_mut(&table) {
            for row in rows.iter_mut() {
                if !matches(row, &query.filters) {
                    continue;
                }
                if !admin && !owned_by(row, &table, &user_id) {
                    continue;
                }
                if let Value::Object(fields) = row {
                    for (key, value) in &patch {
                        fields.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, token: &str, query: &Query) -> BackendResult<()> {
        self.begin_write(&query.table, format!("delete {}", query.table))
            .await?;

        let mut inner = self.lock();
        let user_id = caller(&inner, token)?;
        let admin = is_admin(&inner, &user_id);
        let table = query.table.clone();

        let mut removed_ids = Vec::new();
        if let Some(rows) = inner.tables.get_mut(&table) {
            rows.retain(|row| {
                let permitted = owned_by(row, &table, &user_id) || (admin && table == "posts");
                if matches(row, &query.filters) && permitted {
                    if let Some(id) = row.get("id") {
                        removed_ids.push(filter_value(id));
                    }
                    false
                } else {
                    true
                }
            });
        }

        if table == "posts" {
            for dependent in ["likes", "comments"] {
                if let Some(rows) = inner.tables.get_mut(dependent) {
                    rows.retain(|row| {
                        row.get("post_id")
                            .map(|id| !removed_ids.contains(&filter_value(id)))
                            .unwrap_or(true)
                    });
                }
            }
        }
        Ok(())
    }

    async fn rpc(&self, token: &str, function: &str, args: Value) -> BackendResult<Value> {
        let mut inner = self.lock();
        inner.calls.push(format!("rpc {}", function));
        if function != "redeem_invitation" {
            return Err(BackendError::NotFound);
        }
        let user_id = caller(&inner, token)?;
        let code = args
            .get("invite_code")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        if !inner.invitations.remove(&code) {
            return Ok(Value::Bool(false));
        }
        if let Some(profiles) = inner.tables.get_mut("profiles") {
            for profile in profiles.iter_mut() {
                if profile.get("id").and_then(Value::as_str) == Some(user_id.as_str()) {
                    profile["is_activated"] = Value::Bool(true);
                }
            }
        }
        Ok(Value::Bool(true))
    }

    async fn upload(
        &self,
        token: &str,
        bucket: Bucket,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> BackendResult<()> {
        self.begin_write(
            bucket.as_str(),
            format!("upload {}/{}", bucket.as_str(), key),
        )
        .await?;

        let mut inner = self.lock();
        caller(&inner, token)?;
        let slot = (bucket.as_str().to_string(), key.to_string());
        if inner.objects.contains_key(&slot) {
            return Err(BackendError::Conflict(format!("object {} already exists", key)));
        }
        inner
            .objects
            .insert(slot, (data, content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            PUBLIC_BASE,
            bucket.as_str(),
            key
        )
    }
}

#[async_trait]
impl UserAdmin for MemoryBackend {
    async fn list_users(&self) -> BackendResult<Vec<AuthUser>> {
        Ok(self.lock().users.values().map(|u| u.user.clone()).collect())
    }

    async fn create_confirmed_user(&self, email: &str, password: &str) -> BackendResult<AuthUser> {
        let username = email.split('@').next().unwrap_or(email);
        let session = self.create_user(email, password, username, false, false)?;
        self.confirm_email(&session.user.id).await
    }

    async fn confirm_email(&self, user_id: &str) -> BackendResult<AuthUser> {
        let mut inner = self.lock();
        let stored = inner
            .users
            .get_mut(user_id)
            .ok_or(BackendError::NotFound)?;
        stored.user.email_confirmed_at = Some(now());
        Ok(stored.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_post(backend: &MemoryBackend, id: &str, user_id: &str) {
        backend.seed_row(
            "posts",
            json!({
                "id": id,
                "user_id": user_id,
                "image_url": format!("{}/1.jpg", user_id),
                "caption": "",
                "tag": null,
                "created_at": now(),
            }),
        );
    }

    #[tokio::test]
    async fn sign_up_creates_inactive_profile() {
        let backend = MemoryBackend::new();
        let session = backend.sign_up("ann@example.com", "pw", "ann").await.unwrap();

        let profiles = backend.rows("profiles");
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0]["id"], json!(session.user.id));
        assert_eq!(profiles[0]["username"], json!("ann"));
        assert_eq!(profiles[0]["is_activated"], json!(false));
    }

    #[tokio::test]
    async fn sign_in_checks_password() {
        let backend = MemoryBackend::new();
        backend
            .create_user("ann@example.com", "secret", "ann", false, true)
            .unwrap();

        assert!(backend
            .sign_in_with_password("ann@example.com", "secret")
            .await
            .is_ok());
        let wrong = backend
            .sign_in_with_password("ann@example.com", "nope")
            .await;
        assert!(matches!(wrong, Err(BackendError::Auth(_))));
    }

    #[tokio::test]
    async fn duplicate_like_is_rejected_by_the_store() {
        let backend = MemoryBackend::new();
        let s = backend
            .create_user("ann@example.com", "pw", "ann", false, true)
            .unwrap();
        seed_post(&backend, "p1", &s.user.id);

        let row = json!({ "post_id": "p1", "user_id": s.user.id });
        backend
            .insert(&s.access_token, "likes", row.clone())
            .await
            .unwrap();
        let again = backend.insert(&s.access_token, "likes", row).await;

        assert!(matches!(again, Err(BackendError::Conflict(_))));
        assert_eq!(backend.rows("likes").len(), 1);
    }

    #[tokio::test]
    async fn insert_for_another_user_is_refused() {
        let backend = MemoryBackend::new();
        let s = backend
            .create_user("ann@example.com", "pw", "ann", false, true)
            .unwrap();
        seed_post(&backend, "p1", &s.user.id);

        let result = backend
            .insert(
                &s.access_token,
                "likes",
                json!({ "post_id": "p1", "user_id": "someone-else" }),
            )
            .await;
        assert!(matches!(result, Err(BackendError::Unauthorized)));
    }

    #[tokio::test]
    async fn select_embeds_author_profile_and_orders() {
        let backend = MemoryBackend::new();
        let s = backend
            .create_user("ann@example.com", "pw", "ann", false, true)
            .unwrap();
        backend.seed_row(
            "posts",
            json!({ "id": "old", "user_id": s.user.id, "image_url": "a", "created_at": "2025-01-01T00:00:00.000000Z" }),
        );
        backend.seed_row(
            "posts",
            json!({ "id": "new", "user_id": s.user.id, "image_url": "b", "created_at": "2025-02-01T00:00:00.000000Z" }),
        );

        let rows = backend
            .select(
                &s.access_token,
                &Query::from("posts")
                    .select("id, profiles(username)")
                    .order("created_at", Direction::Descending),
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!("new"));
        assert_eq!(rows[0]["profiles"]["username"], json!("ann"));
        assert!(rows[0].get("image_url").is_none());
    }

    #[tokio::test]
    async fn deleting_a_post_cascades_to_likes_and_comments() {
        let backend = MemoryBackend::new();
        let s = backend
            .create_user("ann@example.com", "pw", "ann", false, true)
            .unwrap();
        seed_post(&backend, "p1", &s.user.id);
        backend
            .insert(&s.access_token, "likes", json!({ "post_id": "p1", "user_id": s.user.id }))
            .await
            .unwrap();
        backend
            .insert(
                &s.access_token,
                "comments",
                json!({ "post_id": "p1", "user_id": s.user.id, "text": "hi" }),
            )
            .await
            .unwrap();

        backend
            .delete(&s.access_token, &Query::from("posts").eq("id", "p1"))
            .await
            .unwrap();

        assert!(backend.rows("posts").is_empty());
        assert!(backend.rows("likes").is_empty());
        assert!(backend.rows("comments").is_empty());
    }

    #[tokio::test]
    async fn redeem_invitation_consumes_code_and_activates() {
        let backend = MemoryBackend::with_invitation_codes(["WELCOME"]);
        let s = backend
            .create_user("ann@example.com", "pw", "ann", false, false)
            .unwrap();

        let first = backend
            .rpc(&s.access_token, "redeem_invitation", json!({ "invite_code": "WELCOME" }))
            .await
            .unwrap();
        let second = backend
            .rpc(&s.access_token, "redeem_invitation", json!({ "invite_code": "WELCOME" }))
            .await
            .unwrap();

        assert_eq!(first, json!(true));
        assert_eq!(second, json!(false));
        assert_eq!(backend.rows("profiles")[0]["is_activated"], json!(true));
    }

    #[tokio::test]
    async fn injected_failures_block_writes_until_cleared() {
        let backend = MemoryBackend::new();
        let s = backend
            .create_user("ann@example.com", "pw", "ann", false, true)
            .unwrap();
        seed_post(&backend, "p1", &s.user.id);
        backend.fail_writes("likes");

        let row = json!({ "post_id": "p1", "user_id": s.user.id });
        assert!(backend.insert(&s.access_token, "likes", row.clone()).await.is_err());

        backend.clear_failures();
        assert!(backend.insert(&s.access_token, "likes", row).await.is_ok());
    }

    #[test]
    fn select_parser_handles_embeds() {
        let columns = parse_select("id, caption, profiles(username, avatar_url)");
        assert_eq!(columns.len(), 3);
        match &columns[2] {
            Column::Embed { table, columns } => {
                assert_eq!(table, "profiles");
                assert_eq!(columns.len(), 2);
            }
            _ => panic!("expected embed"),
        }
    }
}
