use std::collections::HashMap;

use askama::Template;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;

use crate::backend::Bucket;
use crate::db::NewPost;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::home::Html;
use crate::routes::{is_known_tag, TAGS};
use crate::state::AppState;
use crate::upload::{object_key, ImageFile, UploadError};

pub struct TagOption {
    pub name: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "pages/create.html")]
pub struct CreateTemplate {
    pub caption: String,
    pub tags: Vec<TagOption>,
    pub max_caption_chars: usize,
    pub max_megabytes: u64,
    pub error: String,
}

impl CreateTemplate {
    fn new(state: &AppState, caption: String, tag: &str, error: String) -> Self {
        Self {
            caption,
            tags: TAGS
                .iter()
                .map(|t| TagOption {
                    name: t.to_string(),
                    selected: *t == tag,
                })
                .collect(),
            max_caption_chars: state.config.upload.max_caption_chars,
            max_megabytes: state.config.upload.max_bytes / (1024 * 1024),
            error,
        }
    }
}

/// Text fields and at most one file from a multipart form.
#[derive(Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub file: Option<ImageFile>,
}

impl MultipartForm {
    /// Read every field; the one named `file_field` is kept as bytes.
    pub async fn read(mut multipart: Multipart, file_field: &str) -> AppResult<Self> {
        let mut form = MultipartForm::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == file_field {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                let file = ImageFile::new(file_name.as_deref(), content_type.as_deref(), data);
                if !file.is_empty() {
                    form.file = Some(file);
                }
            } else {
                form.fields.insert(name, field.text().await?);
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> String {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/create", get(create_page).post(create_post))
}

async fn create_page(State(state): State<AppState>, _user: CurrentUser) -> Html<CreateTemplate> {
    Html(CreateTemplate::new(&state, String::new(), "", String::new()))
}

/// POST /create: validate the image before anything is uploaded, store it
/// under `{user_id}/{millis}.{ext}`, then insert the post.
async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = MultipartForm::read(multipart, "image").await?;
    let caption = form.text("caption");
    let tag = form.text("tag");

    let rejected = |error: String| {
        (
            StatusCode::BAD_REQUEST,
            Html(CreateTemplate::new(&state, caption.clone(), &tag, error)),
        )
            .into_response()
    };

    let Some(image) = form.file.as_ref() else {
        return Ok(rejected(UploadError::Missing.to_string()));
    };
    if let Err(e) = image.validate(state.config.upload.max_bytes) {
        tracing::debug!("Rejected upload from {}: {}", user.id, e);
        return Ok(rejected(e.to_string()));
    }
    let max_caption = state.config.upload.max_caption_chars;
    if caption.chars().count() > max_caption {
        return Ok(rejected(format!(
            "Caption must be {} characters or less",
            max_caption
        )));
    }
    if !tag.is_empty() && !is_known_tag(&tag) {
        return Ok(rejected("Unknown tag".to_string()));
    }

    let db = state.db(&user);
    let key = object_key(&user.id, Utc::now().timestamp_millis(), &image.extension());
    if let Err(e) = db
        .upload(Bucket::Photos, &key, image.data.clone(), &image.content_type)
        .await
    {
        tracing::error!("Error uploading image {}: {}", key, e);
        return Ok(rejected("Could not upload the image, please try again".into()));
    }

    let post = NewPost {
        user_id: user.id.clone(),
        image_url: db.image_url(Bucket::Photos, &key),
        caption: caption.clone(),
        tag: (!tag.is_empty()).then(|| tag.clone()),
    };
    if let Err(e) = db.create_post(&post).await {
        tracing::error!("Error creating post: {}", e);
        return Ok(rejected("Could not create the post, please try again".into()));
    }

    tracing::info!("{} posted {}", user.username(), key);
    Ok(Redirect::to("/").into_response())
}
