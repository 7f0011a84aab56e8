mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

fn png(len: usize) -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.resize(len, 0);
    data
}

#[tokio::test]
async fn test_oversized_upload_is_rejected_before_upload() {
    let app = TestApp::new();
    app.user("ann@example.com", "ann", false);
    let cookie = app.login("ann@example.com").await;

    let response = app
        .send(multipart_request(
            "/create",
            &cookie,
            &[("caption", "too big"), ("tag", "")],
            Some(FilePart {
                field: "image",
                file_name: "huge.png",
                content_type: "image/png",
                data: png(8 * 1024 * 1024),
            }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_text(response).await;
    assert!(body.contains("Image size should be less than 5MB"));
    assert!(body.contains("too big"), "caption is kept in the form");

    assert!(app.backend.calls().iter().all(|c| !c.starts_with("upload")));
    assert!(app.backend.rows("posts").is_empty());
}

#[tokio::test]
async fn test_non_image_upload_is_rejected() {
    let app = TestApp::new();
    app.user("ann@example.com", "ann", false);
    let cookie = app.login("ann@example.com").await;

    let response = app
        .send(multipart_request(
            "/create",
            &cookie,
            &[("caption", "notes")],
            Some(FilePart {
                field: "image",
                file_name: "notes.txt",
                content_type: "text/plain",
                data: b"hello".to_vec(),
            }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("Please upload an image file"));
    assert!(app.backend.calls().iter().all(|c| !c.starts_with("upload")));
}

#[tokio::test]
async fn test_create_post_uploads_then_inserts() {
    let app = TestApp::new();
    let ann = app.user("ann@example.com", "ann", false);
    let cookie = app.login("ann@example.com").await;

    let response = app
        .send(multipart_request(
            "/create",
            &cookie,
            &[("caption", "birthday cake"), ("tag", "birthday")],
            Some(FilePart {
                field: "image",
                file_name: "cake.PNG",
                content_type: "image/png",
                data: png(1024),
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let posts = app.backend.rows("posts");
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["user_id"], json!(ann));
    assert_eq!(posts[0]["caption"], "birthday cake");
    assert_eq!(posts[0]["tag"], "birthday");

    let upload = app
        .backend
        .calls()
        .into_iter()
        .find(|c| c.starts_with("upload photos/"))
        .expect("an upload call");
    let key = upload.trim_start_matches("upload photos/").to_string();
    assert!(key.starts_with(&format!("{}/", ann)));
    assert!(key.ends_with(".png"));
    assert!(posts[0]["image_url"].as_str().unwrap().ends_with(&key));

    let feed = body_text(app.send(get("/?tag=birthday", Some(&cookie))).await).await;
    assert!(feed.contains("birthday cake"));
    let feed = body_text(app.send(get("/?tag=music", Some(&cookie))).await).await;
    assert!(!feed.contains("birthday cake"));
    assert!(feed.contains("No music posts yet."));
}

#[tokio::test]
async fn test_caption_limit_is_enforced() {
    let app = TestApp::new();
    app.user("ann@example.com", "ann", false);
    let cookie = app.login("ann@example.com").await;
    let caption = "x".repeat(201);

    let response = app
        .send(multipart_request(
            "/create",
            &cookie,
            &[("caption", &caption)],
            Some(FilePart {
                field: "image",
                file_name: "a.jpg",
                content_type: "image/jpeg",
                data: vec![0xff, 0xd8, 0xff],
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response)
        .await
        .contains("Caption must be 200 characters or less"));
}

#[tokio::test]
async fn test_missing_post_renders_not_found_page() {
    let app = TestApp::new();
    app.user("ann@example.com", "ann", false);
    let cookie = app.login("ann@example.com").await;

    let response = app.send(get("/post/nope", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_text(response).await;
    assert!(body.contains("Post not found"));
    assert!(body.contains("href=\"/\""));
}

#[tokio::test]
async fn test_comments_are_listed_oldest_first() {
    let app = TestApp::new();
    let ann = app.user("ann@example.com", "ann", false);
    app.user("bob@example.com", "bob", false);
    app.seed_post("p1", &ann);
    let ann_cookie = app.login("ann@example.com").await;
    let bob_cookie = app.login("bob@example.com").await;

    let response = app
        .send(form_request("/post/p1/comments", Some(&ann_cookie), "text=first+one"))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/post/p1");
    app.send(form_request("/post/p1/comments", Some(&bob_cookie), "text=second+one"))
        .await;

    let page = body_text(app.send(get("/post/p1", Some(&ann_cookie))).await).await;
    let first = page.find("first one").unwrap();
    let second = page.find("second one").unwrap();
    assert!(first < second);
    assert!(page.contains("bob"));
}

#[tokio::test]
async fn test_blank_comment_is_rejected_inline() {
    let app = TestApp::new();
    let ann = app.user("ann@example.com", "ann", false);
    app.seed_post("p1", &ann);
    let cookie = app.login("ann@example.com").await;

    let response = app
        .send(form_request("/post/p1/comments", Some(&cookie), "text=+++"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Comment cannot be empty"));
    assert!(app.backend.rows("comments").is_empty());
}

#[tokio::test]
async fn test_only_owner_or_admin_can_delete() {
    let app = TestApp::new();
    let ann = app.user("ann@example.com", "ann", false);
    app.user("bob@example.com", "bob", false);
    app.user("root@example.com", "root", true);
    app.seed_post("p1", &ann);
    app.seed_post("p2", &ann);
    app.seed_likes("p1", 2);

    let bob = app.login("bob@example.com").await;
    let response = app
        .send(form_request("/post/p1/delete", Some(&bob), ""))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.backend.rows("posts").len(), 2);

    let owner = app.login("ann@example.com").await;
    let response = app
        .send(form_request("/post/p1/delete", Some(&owner), ""))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.backend.rows("posts").len(), 1);
    assert!(app.backend.rows("likes").is_empty());

    let admin = app.login("root@example.com").await;
    let response = app
        .send(form_request("/post/p2/delete", Some(&admin), ""))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app.backend.rows("posts").is_empty());
}

#[tokio::test]
async fn test_weekly_theme_is_admin_only() {
    let app = TestApp::new();
    app.user("ann@example.com", "ann", false);
    app.user("root@example.com", "root", true);

    let ann = app.login("ann@example.com").await;
    let response = app
        .send(form_request("/theme", Some(&ann), "content=Golden+hour"))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = app.login("root@example.com").await;
    let response = app
        .send(form_request("/theme", Some(&admin), "content=Golden+hour"))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let feed = body_text(app.send(get("/", Some(&ann))).await).await;
    assert!(feed.contains("Golden hour"));
    assert!(!feed.contains("action=\"/theme\""));
}

#[tokio::test]
async fn test_profile_update_changes_username_and_avatar() {
    let app = TestApp::new();
    let ann = app.user("ann@example.com", "ann", false);
    let cookie = app.login("ann@example.com").await;

    let response = app
        .send(multipart_request(
            "/profile",
            &cookie,
            &[("username", "annie")],
            Some(FilePart {
                field: "avatar",
                file_name: "me.jpg",
                content_type: "image/jpeg",
                data: vec![0xff, 0xd8, 0xff, 0xe0],
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile");

    let profile = app
        .backend
        .rows("profiles")
        .into_iter()
        .find(|p| p["id"] == json!(ann))
        .unwrap();
    assert_eq!(profile["username"], "annie");
    assert!(profile["avatar_url"]
        .as_str()
        .unwrap()
        .contains(&format!("avatars/{}/", ann)));

    let page = body_text(app.send(get("/profile", Some(&cookie))).await).await;
    assert!(page.contains("annie"));
}

#[tokio::test]
async fn test_profile_without_avatar_keeps_existing_one() {
    let app = TestApp::new();
    let ann = app.user("ann@example.com", "ann", false);
    let cookie = app.login("ann@example.com").await;

    let response = app
        .send(multipart_request("/profile", &cookie, &[("username", "annie")], None))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app.backend.calls().iter().all(|c| !c.starts_with("upload")));

    let profile = app
        .backend
        .rows("profiles")
        .into_iter()
        .find(|p| p["id"] == json!(ann))
        .unwrap();
    assert_eq!(profile["avatar_url"], json!(null));
}
