//! Photo uploads.
//!
//! Images are written under the configured photo directory as
//! `<sha256-hex>.<ext>`, so re-uploading the same bytes reuses one file. Only
//! the relative path, hash and media type reach the database.
//!
//! A request whose database write fails removes the files it created. Files
//! that were already on disk are left alone; another visit may reference
//! them.

use std::path::Path as FsPath;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde::Deserialize;
use sha2::{Digest as _, Sha256};
use storewalk_core::{
  store::VisitStore,
  transcribe::Transcriber,
  visit::{NewPhoto, VisitId},
};
use tracing::{debug, info, warn};

use crate::{
  AppState, Backend,
  error::{ApiError, store_err},
};

/// A base64-encoded image in a request body.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoUpload {
  pub data:       String,
  #[serde(alias = "mime_type")]
  pub media_type: String,
}

impl PhotoUpload {
  /// Decode the payload; an optional `data:<type>;base64,` prefix is
  /// skipped.
  pub fn decode(&self) -> Result<Vec<u8>, ApiError> {
    let data = self.data.trim();
    let payload = data
      .split_once(";base64,")
      .filter(|(head, _)| head.starts_with("data:"))
      .map_or(data, |(_, body)| body);
    let bytes = B64
      .decode(payload)
      .map_err(|e| ApiError::BadRequest(format!("invalid base64 image data: {e}")))?;
    if bytes.is_empty() {
      return Err(ApiError::BadRequest("image data is empty".into()));
    }
    Ok(bytes)
  }
}

/// File extension for a supported image media type.
fn extension(media_type: &str) -> Option<&'static str> {
  match media_type.trim().to_ascii_lowercase().as_str() {
    "image/jpeg" | "image/jpg" => Some("jpg"),
    "image/png" => Some("png"),
    "image/webp" => Some("webp"),
    "image/heic" => Some("heic"),
    "image/heif" => Some("heif"),
    _ => None,
  }
}

/// A photo on disk, ready to be referenced from a visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPhoto {
  pub photo:   NewPhoto,
  /// Whether this call created the file.
  pub created: bool,
}

/// Write an upload to `dir` and return the reference to store.
pub async fn save_photo(dir: &FsPath, upload: &PhotoUpload) -> Result<SavedPhoto, ApiError> {
  let ext = extension(&upload.media_type).ok_or_else(|| {
    ApiError::BadRequest(format!("unsupported media type: {}", upload.media_type))
  })?;
  let bytes = upload.decode()?;
  let content_hash = hex::encode(Sha256::digest(&bytes));
  let file_name = format!("{content_hash}.{ext}");

  let path = dir.join(&file_name);
  let created = if tokio::fs::try_exists(&path).await? {
    debug!(%file_name, "photo already on disk");
    false
  } else {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, &bytes).await?;
    info!(%file_name, size = bytes.len(), "photo written");
    true
  };

  let photo = NewPhoto {
    path: file_name,
    content_hash,
    media_type: upload.media_type.trim().to_ascii_lowercase(),
  };
  Ok(SavedPhoto { photo, created })
}

/// Save every upload, removing the files already created if one fails.
pub async fn save_photos(
  dir: &FsPath,
  uploads: &[PhotoUpload],
) -> Result<Vec<SavedPhoto>, ApiError> {
  let mut saved = Vec::with_capacity(uploads.len());
  for upload in uploads {
    match save_photo(dir, upload).await {
      Ok(photo) => saved.push(photo),
      Err(e) => {
        discard_photos(dir, &saved).await;
        return Err(e);
      }
    }
  }
  Ok(saved)
}

/// Remove the files `saved` created. Failures are logged, not returned.
pub async fn discard_photos(dir: &FsPath, saved: &[SavedPhoto]) {
  for photo in saved.iter().filter(|p| p.created) {
    if let Err(e) = tokio::fs::remove_file(dir.join(&photo.photo.path)).await {
      warn!(file_name = %photo.photo.path, error = %e, "failed to remove unreferenced photo");
    }
  }
}

/// `POST /visits/:id/photos`: body is a [`PhotoUpload`]; returns 201 + the
/// stored reference.
pub async fn upload<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<VisitId>,
  Json(body): Json<PhotoUpload>,
) -> Result<impl IntoResponse, ApiError> {
  let saved = save_photo(&state.photo_dir, &body).await?;
  let stored = match state.store.add_photo(id, saved.photo.clone()).await {
    Ok(Some(stored)) => stored,
    Ok(None) => {
      discard_photos(&state.photo_dir, &[saved]).await;
      return Err(ApiError::NotFound(format!("visit {id} not found")));
    }
    Err(e) => {
      discard_photos(&state.photo_dir, &[saved]).await;
      return Err(store_err(e));
    }
  };
  Ok((StatusCode::CREATED, Json(stored)))
}
