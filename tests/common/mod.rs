#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

use moments::backend::MemoryBackend;
use moments::config::{BackendKind, Config};
use moments::state::AppState;

pub const BOUNDARY: &str = "----moments-test-boundary";

pub struct TestApp {
    pub backend: Arc<MemoryBackend>,
    pub state: AppState,
    pub router: Router,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.backend.kind = BackendKind::Memory;
    config.icebreaker.reset_delay_ms = 0;
    config
}

impl TestApp {
    pub fn new() -> Self {
        let backend = Arc::new(MemoryBackend::with_invitation_codes(["WELCOME"]));
        let state = AppState::new(backend.clone(), test_config());
        let router = moments::routes::app(state.clone());
        Self {
            backend,
            state,
            router,
        }
    }

    /// Create an activated user and return their user id.
    pub fn user(&self, email: &str, username: &str, is_admin: bool) -> String {
        self.backend
            .create_user(email, "password", username, is_admin, true)
            .unwrap()
            .user
            .id
    }

    pub fn seed_post(&self, id: &str, user_id: &str) {
        self.backend.seed_row(
            "posts",
            json!({
                "id": id,
                "user_id": user_id,
                "image_url": format!("{}/1700000000000.jpg", user_id),
                "caption": "sunset at the lake",
                "tag": "outdoors",
                "created_at": chrono::Utc::now().to_rfc3339(),
            }),
        );
    }

    pub fn seed_likes(&self, post_id: &str, n: usize) {
        for i in 0..n {
            self.backend.seed_row(
                "likes",
                json!({ "post_id": post_id, "user_id": format!("liker-{}", i) }),
            );
        }
    }

    pub fn likes_by(&self, post_id: &str, user_id: &str) -> usize {
        self.backend
            .rows("likes")
            .iter()
            .filter(|l| l["post_id"] == json!(post_id) && l["user_id"] == json!(user_id))
            .count()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Sign in through the login form and return the `Cookie` header value.
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .send(form_request(
                "/login",
                None,
                &format!("email={}&password=password&mode=signin", email),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response)
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn form_request(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub struct FilePart<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub data: Vec<u8>,
}

pub fn multipart_request(
    uri: &str,
    cookie: &str,
    fields: &[(&str, &str)],
    file: Option<FilePart<'_>>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some(file) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file.field, file.file_name, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(&file.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::COOKIE, cookie)
        .body(Body::from(body))
        .unwrap()
}

pub fn session_cookie(response: &Response<Body>) -> String {
    response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

pub fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
