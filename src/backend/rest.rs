//! REST client for the hosted backend platform.
//!
//! Auth lives under `/auth/v1`, tables and RPCs under `/rest/v1`, object
//! storage under `/storage/v1`. Every request carries the project's public
//! key in `apikey` and a bearer token: the caller's access token when there is
//! one, the public key otherwise.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::{
    filter_value, AuthSession, AuthUser, Backend, BackendError, BackendResult, Bucket, Direction,
    Query, UserAdmin,
};

#[derive(Clone)]
pub struct RestBackend {
    base_url: String,
    anon_key: String,
    service_role_key: Option<String>,
    client: Client,
}

#[derive(Deserialize)]
struct AdminUserList {
    users: Vec<AuthUser>,
}

impl RestBackend {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(base_url)?;
        Ok(Self {
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            service_role_key: None,
            client: Client::new(),
        })
    }

    /// Attach the privileged key used by the [`UserAdmin`] calls.
    pub fn with_service_role(mut self, key: &str) -> Self {
        self.service_role_key = Some(key.to_string());
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        let bearer = if token.is_empty() {
            self.anon_key.as_str()
        } else {
            token
        };
        self.client
            .request(method, self.endpoint(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn admin_request(&self, method: Method, path: &str) -> BackendResult<RequestBuilder> {
        let key = self
            .service_role_key
            .as_deref()
            .ok_or(BackendError::Unauthorized)?;
        Ok(self
            .client
            .request(method, self.endpoint(path))
            .header("apikey", key)
            .bearer_auth(key))
    }

    fn table_request(&self, method: Method, token: &str, query: &Query) -> RequestBuilder {
        self.request(method, &format!("rest/v1/{}", query.table), token)
            .query(&query_pairs(query))
    }

    async fn json_rows(response: Response) -> BackendResult<Vec<Value>> {
        let response = check(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(&text)? {
            Value::Array(rows) => Ok(rows),
            other => Ok(vec![other]),
        }
    }

    async fn auth_session(response: Response) -> BackendResult<AuthSession> {
        let response = check_auth(response).await?;
        let body: Value = response.json().await?;
        if body.get("access_token").is_none() {
            return Err(BackendError::Auth(
                "Check your inbox to confirm your e-mail address, then sign in".into(),
            ));
        }
        Ok(serde_json::from_value(body)?)
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> BackendResult<AuthSession> {
        let response = self
            .request(Method::POST, "auth/v1/signup", "")
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "username": username },
            }))
            .send()
            .await?;
        Self::auth_session(response).await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> BackendResult<AuthSession> {
        let response = self
            .request(Method::POST, "auth/v1/token", "")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        Self::auth_session(response).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> BackendResult<AuthSession> {
        let response = self
            .request(Method::POST, "auth/v1/token", "")
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        Self::auth_session(response).await
    }

    async fn sign_out(&self, token: &str) -> BackendResult<()> {
        let response = self
            .request(Method::POST, "auth/v1/logout", token)
            .send()
            .await?;
        check_auth(response).await?;
        Ok(())
    }

    async fn get_user(&self, token: &str) -> BackendResult<AuthUser> {
        let response = self
            .request(Method::GET, "auth/v1/user", token)
            .send()
            .await?;
        Ok(check_auth(response).await?.json().await?)
    }

    async fn select(&self, token: &str, query: &Query) -> BackendResult<Vec<Value>> {
        let response = self
            .table_request(Method::GET, token, query)
            .send()
            .await?;
        Self::json_rows(response).await
    }

    async fn count(&self, token: &str, query: &Query) -> BackendResult<u64> {
        let response = self
            .table_request(Method::HEAD, token, query)
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = check(response).await?;
        let range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| BackendError::Decode("missing Content-Range header".into()))?;
        parse_content_range(range)
    }

    async fn insert(&self, token: &str, table: &str, row: Value) -> BackendResult<Vec<Value>> {
        let response = self
            .request(Method::POST, &format!("rest/v1/{}", table), token)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        Self::json_rows(response).await
    }

    async fn update(&self, token: &str, query: &Query, patch: Value) -> BackendResult<Vec<Value>> {
        let response = self
            .table_request(Method::PATCH, token, query)
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        Self::json_rows(response).await
    }

    async fn delete(&self, token: &str, query: &Query) -> BackendResult<()> {
        let response = self
            .table_request(Method::DELETE, token, query)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn rpc(&self, token: &str, function: &str, args: Value) -> BackendResult<Value> {
        let response = self
            .request(Method::POST, &format!("rest/v1/rpc/{}", function), token)
            .json(&args)
            .send()
            .await?;
        let text = check(response).await?.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn upload(
        &self,
        token: &str,
        bucket: Bucket,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> BackendResult<()> {
        let response = self
            .request(
                Method::POST,
                &format!("storage/v1/object/{}/{}", bucket.as_str(), key),
                token,
            )
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        self.endpoint(&format!(
            "storage/v1/object/public/{}/{}",
            bucket.as_str(),
            key
        ))
    }
}

#[async_trait]
impl UserAdmin for RestBackend {
    async fn list_users(&self) -> BackendResult<Vec<AuthUser>> {
        let response = self
            .admin_request(Method::GET, "auth/v1/admin/users")?
            .send()
            .await?;
        let list: AdminUserList = check_auth(response).await?.json().await?;
        Ok(list.users)
    }

    async fn create_confirmed_user(&self, email: &str, password: &str) -> BackendResult<AuthUser> {
        let response = self
            .admin_request(Method::POST, "auth/v1/admin/users")?
            .json(&json!({
                "email": email,
                "password": password,
                "email_confirm": true,
            }))
            .send()
            .await?;
        Ok(check_auth(response).await?.json().await?)
    }

    async fn confirm_email(&self, user_id: &str) -> BackendResult<AuthUser> {
        let response = self
            .admin_request(Method::PUT, &format!("auth/v1/admin/users/{}", user_id))?
            .json(&json!({ "email_confirm": true }))
            .send()
            .await?;
        Ok(check_auth(response).await?.json().await?)
    }
}

fn query_pairs(query: &Query) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_string(), query.select.replace(' ', ""))];
    for (column, value) in &query.filters {
        pairs.push((column.clone(), format!("eq.{}", filter_value(value))));
    }
    if let Some((column, direction)) = &query.order {
        let dir = match direction {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        };
        pairs.push(("order".to_string(), format!("{}.{}", column, dir)));
    }
    if let Some(limit) = query.limit {
        pairs.push(("limit".to_string(), limit.to_string()));
    }
    pairs
}

/// `0-24/3573` or `*/0` → total row count.
fn parse_content_range(range: &str) -> BackendResult<u64> {
    range
        .rsplit('/')
        .next()
        .and_then(|total| total.trim().parse().ok())
        .ok_or_else(|| BackendError::Decode(format!("bad Content-Range: {}", range)))
}

/// Pull a human message out of an error body.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    body.chars().take(200).collect()
}

async fn check(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = error_message(&response.text().await.unwrap_or_default());
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized,
        StatusCode::NOT_FOUND => BackendError::NotFound,
        StatusCode::CONFLICT => BackendError::Conflict(message),
        _ => BackendError::Status {
            status: status.as_u16(),
            message,
        },
    })
}

/// Auth endpoints report bad credentials as 400/422 with a readable message.
async fn check_auth(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
        let message = error_message(&response.text().await.unwrap_or_default());
        return Err(BackendError::Auth(message));
    }
    check(response).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> RestBackend {
        RestBackend::new("https://project.example.co/", "anon").unwrap()
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(
            backend().endpoint("/rest/v1/posts"),
            "https://project.example.co/rest/v1/posts"
        );
    }

    #[test]
    fn public_url_points_at_public_object_path() {
        assert_eq!(
            backend().public_url(Bucket::Photos, "u1/1700000000000.jpg"),
            "https://project.example.co/storage/v1/object/public/photos/u1/1700000000000.jpg"
        );
    }

    #[test]
    fn new_rejects_invalid_url() {
        assert!(RestBackend::new("not a url", "anon").is_err());
    }

    #[test]
    fn query_pairs_encode_filters_order_and_limit() {
        let q = Query::from("weekly_themes")
            .select("*, profiles(username)")
            .eq("created_by", "u1")
            .order("created_at", Direction::Descending)
            .limit(1);
        let pairs = query_pairs(&q);
        assert_eq!(
            pairs,
            vec![
                ("select".to_string(), "*,profiles(username)".to_string()),
                ("created_by".to_string(), "eq.u1".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn content_range_total_is_parsed() {
        assert_eq!(parse_content_range("0-24/3573").unwrap(), 3573);
        assert_eq!(parse_content_range("*/0").unwrap(), 0);
        assert!(parse_content_range("0-24/*").is_err());
    }

    #[test]
    fn error_message_prefers_json_fields() {
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key"}"#),
            "duplicate key"
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message("plain failure"), "plain failure");
    }

    #[tokio::test]
    async fn select_against_unreachable_server_errors() {
        let backend = RestBackend::new("http://127.0.0.1:1", "anon").unwrap();
        let result = backend.select("", &Query::from("posts")).await;
        assert!(matches!(result, Err(BackendError::Http(_))));
    }

    #[tokio::test]
    async fn admin_calls_require_service_role_key() {
        let result = backend().list_users().await;
        assert!(matches!(result, Err(BackendError::Unauthorized)));
    }
}
