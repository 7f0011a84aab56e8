//! Per-entity calls against the platform's tables, storage and RPC.
//!
//! [`Db`] binds a backend to the caller's access token; each method is a
//! single pass-through query or mutation.

pub mod models;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::backend::{Backend, BackendError, BackendResult, Bucket, Direction, Query};

use self::models::{
    decode, decode_all, CommentWithAuthor, Post, PostWithAuthor, Profile, WeeklyTheme,
};

pub const POSTS: &str = "posts";
pub const LIKES: &str = "likes";
pub const COMMENTS: &str = "comments";
pub const PROFILES: &str = "profiles";
pub const WEEKLY_THEMES: &str = "weekly_themes";

const POST_WITH_AUTHOR: &str = "id, user_id, image_url, caption, tag, created_at, profiles(username, avatar_url)";
const COMMENT_WITH_AUTHOR: &str = "id, post_id, user_id, text, created_at, profiles(username, avatar_url)";

#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub user_id: String,
    pub image_url: String,
    pub caption: String,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Copy)]
pub struct Db<'a> {
    backend: &'a dyn Backend,
    token: &'a str,
}

impl<'a> Db<'a> {
    pub fn new(backend: &'a dyn Backend, token: &'a str) -> Self {
        Self { backend, token }
    }

    async fn first<T>(&self, query: Query) -> BackendResult<Option<T>>
    where
        T: models::Record + for<'de> serde::Deserialize<'de>,
    {
        let mut rows = self.backend.select(self.token, &query.limit(1)).await?;
        match rows.pop() {
            Some(row) => Ok(Some(decode(row)?)),
            None => Ok(None),
        }
    }

    // --- Posts ---

    /// Newest first, optionally restricted to one tag.
    pub async fn list_posts(&self, tag: Option<&str>) -> BackendResult<Vec<PostWithAuthor>> {
        let mut query = Query::from(POSTS)
            .select(POST_WITH_AUTHOR)
            .order("created_at", Direction::Descending);
        if let Some(tag) = tag {
            query = query.eq("tag", tag);
        }
        decode_all(self.backend.select(self.token, &query).await?)
    }

    pub async fn get_post(&self, id: &str) -> BackendResult<PostWithAuthor> {
        self.first(Query::from(POSTS).select(POST_WITH_AUTHOR).eq("id", id))
            .await?
            .ok_or(BackendError::NotFound)
    }

    pub async fn posts_by_user(&self, user_id: &str) -> BackendResult<Vec<Post>> {
        let query = Query::from(POSTS)
            .eq("user_id", user_id)
            .order("created_at", Direction::Descending);
        decode_all(self.backend.select(self.token, &query).await?)
    }

    pub async fn create_post(&self, post: &NewPost) -> BackendResult<()> {
        self.backend
            .insert(self.token, POSTS, serde_json::to_value(post)?)
            .await?;
        Ok(())
    }

    pub async fn delete_post(&self, id: &str) -> BackendResult<()> {
        self.backend
            .delete(self.token, &Query::from(POSTS).eq("id", id))
            .await
    }

    // --- Likes ---

    pub async fn like_count(&self, post_id: &str) -> BackendResult<u64> {
        self.backend
            .count(self.token, &Query::from(LIKES).eq("post_id", post_id))
            .await
    }

    pub async fn has_liked(&self, post_id: &str, user_id: &str) -> BackendResult<bool> {
        let query = Query::from(LIKES)
            .select("post_id")
            .eq("post_id", post_id)
            .eq("user_id", user_id)
            .limit(1);
        Ok(!self.backend.select(self.token, &query).await?.is_empty())
    }

    pub async fn like(&self, post_id: &str, user_id: &str) -> BackendResult<()> {
        self.backend
            .insert(
                self.token,
                LIKES,
                json!({ "post_id": post_id, "user_id": user_id }),
            )
            .await?;
        Ok(())
    }

    pub async fn unlike(&self, post_id: &str, user_id: &str) -> BackendResult<()> {
        let query = Query::from(LIKES)
            .eq("post_id", post_id)
            .eq("user_id", user_id);
        self.backend.delete(self.token, &query).await
    }

    // --- Comments ---

    /// Oldest first.
    pub async fn list_comments(&self, post_id: &str) -> BackendResult<Vec<CommentWithAuthor>> {
        let query = Query::from(COMMENTS)
            .select(COMMENT_WITH_AUTHOR)
            .eq("post_id", post_id)
            .order("created_at", Direction::Ascending);
        decode_all(self.backend.select(self.token, &query).await?)
    }

    pub async fn add_comment(&self, post_id: &str, user_id: &str, text: &str) -> BackendResult<()> {
        self.backend
            .insert(
                self.token,
                COMMENTS,
                json!({ "post_id": post_id, "user_id": user_id, "text": text }),
            )
            .await?;
        Ok(())
    }

    // --- Profiles ---

    pub async fn get_profile(&self, id: &str) -> BackendResult<Profile> {
        self.first(Query::from(PROFILES).eq("id", id))
            .await?
            .ok_or(BackendError::NotFound)
    }

    pub async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> BackendResult<()> {
        let patch = json!({
            "username": update.username,
            "avatar_url": update.avatar_url,
            "updated_at": Utc::now().to_rfc3339(),
        });
        let updated = self
            .backend
            .update(self.token, &Query::from(PROFILES).eq("id", id), patch)
            .await?;
        if updated.is_empty() {
            return Err(BackendError::Unauthorized);
        }
        Ok(())
    }

    // --- Weekly themes ---

    /// The newest theme, if any has been published.
    pub async fn latest_theme(&self) -> BackendResult<Option<WeeklyTheme>> {
        self.first(Query::from(WEEKLY_THEMES).order("created_at", Direction::Descending))
            .await
    }

    pub async fn create_theme(&self, content: &str, created_by: &str) -> BackendResult<()> {
        self.backend
            .insert(
                self.token,
                WEEKLY_THEMES,
                json!({ "content": content, "created_by": created_by }),
            )
            .await?;
        Ok(())
    }

    // --- Invitations ---

    pub async fn redeem_invitation(&self, code: &str) -> BackendResult<bool> {
        let result = self
            .backend
            .rpc(
                self.token,
                "redeem_invitation",
                json!({ "invite_code": code }),
            )
            .await?;
        Ok(matches!(result, Value::Bool(true)))
    }

    // --- Storage ---

    pub async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> BackendResult<()> {
        self.backend
            .upload(self.token, bucket, key, data, content_type)
            .await
    }

    /// Stored keys resolve to the bucket's public URL; absolute URLs pass through.
    pub fn image_url(&self, bucket: Bucket, key: &str) -> String {
        resolve_image_url(self.backend, bucket, key)
    }
}

pub fn resolve_image_url(backend: &dyn Backend, bucket: Bucket, key: &str) -> String {
    if key.is_empty() {
        String::new()
    } else if key.starts_with("http") {
        key.to_string()
    } else {
        backend.public_url(bucket, key)
    }
}
