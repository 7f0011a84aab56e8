use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::backend::{BackendError, BackendResult};

/// Row types decoded from the platform. `validate` runs after decoding so a
/// row that parses but makes no sense is still rejected at the boundary.
pub trait Record: Sized {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

pub fn decode<T>(row: Value) -> BackendResult<T>
where
    T: Record + for<'de> Deserialize<'de>,
{
    let record: T = serde_json::from_value(row)?;
    record.validate().map_err(BackendError::Decode)?;
    Ok(record)
}

pub fn decode_all<T>(rows: Vec<Value>) -> BackendResult<Vec<T>>
where
    T: Record + for<'de> Deserialize<'de>,
{
    rows.into_iter().map(decode).collect()
}

/// Ids may come back as UUID strings or integer keys.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or integer id, got {}",
            other
        ))),
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} must not be empty", field))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_activated: bool,
    pub created_at: DateTime<Utc>,
}

impl Record for Profile {
    fn validate(&self) -> Result<(), String> {
        non_empty("profile id", &self.id)
    }
}

impl Profile {
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or("Unknown User")
    }
}

/// The author fields embedded in post and comment selects.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Author {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Author {
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or("Unknown User")
    }

    /// Uppercased first letter, for the avatar placeholder.
    pub fn initial(&self) -> String {
        self.username
            .as_deref()
            .and_then(|u| u.chars().next())
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_else(|| "U".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub user_id: String,
    pub image_url: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub caption: String,
    #[serde(default)]
    pub tag: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for Post {
    fn validate(&self) -> Result<(), String> {
        non_empty("post id", &self.id)?;
        non_empty("image_url", &self.image_url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostWithAuthor {
    #[serde(flatten)]
    pub post: Post,
    #[serde(default, rename = "profiles")]
    pub author: Option<Author>,
}

impl Record for PostWithAuthor {
    fn validate(&self) -> Result<(), String> {
        self.post.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Like {
    #[serde(deserialize_with = "id_string")]
    pub post_id: String,
    pub user_id: String,
}

impl Record for Like {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub post_id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Record for Comment {
    fn validate(&self) -> Result<(), String> {
        non_empty("comment text", &self.text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    #[serde(default, rename = "profiles")]
    pub author: Option<Author>,
}

impl Record for CommentWithAuthor {
    fn validate(&self) -> Result<(), String> {
        self.comment.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklyTheme {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for WeeklyTheme {}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
