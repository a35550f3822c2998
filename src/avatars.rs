use anyhow::Context;
use axum::extract::Multipart;
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::storage::StorageClient;

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Multipart field carrying the image.
const FILE_FIELD: &str = "file";

#[derive(Debug)]
pub struct AvatarUpload {
    pub body: Bytes,
    pub content_type: String,
}

impl AvatarUpload {
    pub fn new(body: Bytes, content_type: &str) -> AppResult<Self> {
        if body.is_empty() {
            return Err(AppError::bad_request("Avatar file is empty"));
        }
        if body.len() > MAX_AVATAR_BYTES {
            return Err(AppError::bad_request("Avatar file is too large"));
        }
        if !content_type.starts_with("image/") {
            return Err(AppError::bad_request("Avatar must be an image"));
        }
        Ok(Self {
            body,
            content_type: content_type.to_string(),
        })
    }
}

/// Pulls the `file` field out of a multipart body.
pub async fn read_avatar(mut mp: Multipart) -> AppResult<AvatarUpload> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("Could not read upload: {}", e)))?;
        return AvatarUpload::new(data, &content_type);
    }
    Err(AppError::bad_request("file is required"))
}

/// Uploads under `key` and returns a URL that changes with every upload.
pub async fn store_avatar(
    storage: &dyn StorageClient,
    key: &str,
    upload: AvatarUpload,
) -> AppResult<String> {
    let size = upload.body.len();
    storage
        .put_object(key, upload.body, &upload.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    debug!(key, size, "avatar stored");
    Ok(format!(
        "{}?v={}",
        storage.public_url(key),
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    ))
}
