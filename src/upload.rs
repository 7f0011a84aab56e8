//! Checks applied to image uploads before anything is sent to storage, and
//! the object key convention.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("Please upload an image file")]
    NotAnImage,

    #[error("Image size should be less than {0}MB")]
    TooLarge(u64),

    #[error("Please choose an image to upload")]
    Missing,
}

const MAX_EXTENSION_CHARS: usize = 5;

/// A file received from a multipart form.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub data: bytes::Bytes,
}

impl ImageFile {
    /// Use the declared content type, falling back to the file extension.
    pub fn new(file_name: Option<&str>, content_type: Option<&str>, data: bytes::Bytes) -> Self {
        let file_name = file_name.unwrap_or_default().to_string();
        let content_type = content_type
            .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
            .map(str::to_string)
            .unwrap_or_else(|| {
                mime_guess::from_path(&file_name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });
        Self {
            file_name,
            content_type,
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.file_name.is_empty()
    }

    /// Reject non-images and anything over `max_bytes`.
    pub fn validate(&self, max_bytes: u64) -> Result<(), UploadError> {
        if self.data.is_empty() {
            return Err(UploadError::Missing);
        }
        if !self.content_type.starts_with("image/") {
            return Err(UploadError::NotAnImage);
        }
        if self.data.len() as u64 > max_bytes {
            return Err(UploadError::TooLarge(max_bytes / (1024 * 1024)));
        }
        Ok(())
    }

    /// File extension from the name, or from the content type when the name
    /// has none. Only short alphanumeric extensions are taken from the name,
    /// since the result becomes part of a storage path.
    pub fn extension(&self) -> String {
        if let Some((_, ext)) = self.file_name.rsplit_once('.') {
            if is_plain_extension(ext) {
                return ext.to_ascii_lowercase();
            }
        }
        mime_guess::get_mime_extensions_str(&self.content_type)
            .and_then(|exts| exts.first())
            .map(|ext| ext.to_string())
            .unwrap_or_else(|| "bin".to_string())
    }
}

fn is_plain_extension(ext: &str) -> bool {
    (1..=MAX_EXTENSION_CHARS).contains(&ext.len())
        && ext.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// `{user_id}/{unix_millis}.{ext}`
pub fn object_key(user_id: &str, unix_millis: i64, ext: &str) -> String {
    format!("{}/{}.{}", user_id, unix_millis, ext)
}
