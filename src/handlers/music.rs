use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use garde::Validate;
use serde::Deserialize;
use tokio::io::{AsyncWriteExt, BufWriter};
use uuid::Uuid;

use crate::{
    error::{json_response, message_body, AppError, Result},
    media::{range, streamer::MediaFile},
    models::{media::MediaKind, session::AuthenticatedUser},
    state::AppState,
};

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "paymentScreenshot";
/// Multipart field naming the user the upload belongs to.
pub const EMAIL_FIELD: &str = "email";

const DEFAULT_LANGUAGE: &str = "en";
const PART_SUFFIX: &str = "part";

#[derive(Deserialize)]
pub struct ListMusicQuery {
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

#[derive(Validate)]
struct UploadOwner {
    #[garde(email)]
    email: String,
}

/// Lists the playable files of a language.
pub async fn list_music(
    State(state): State<AppState>,
    Query(params): Query<ListMusicQuery>,
) -> Result<Response> {
    tracing::debug!("📂 Listing music - language: {}", params.language);

    let entries = state.library.list(&params.language).await?;

    let body = sonic_rs::to_string(&entries)
        .map_err(|e| AppError::Internal(format!("Listing serialization failed: {}", e)))?;

    Ok(json_response(StatusCode::OK, body))
}

/// Streams a media file, honouring `Range` requests.
pub async fn stream_music(
    State(state): State<AppState>,
    Path((language, filename)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    let kind = MediaKind::from_filename(&filename).ok_or(AppError::UnsupportedMediaType)?;
    let path = state.library.file_path(&language, &filename)?;

    let media = MediaFile::open(&path, kind).await?;

    let range_header = headers
        .get(header::RANGE)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| AppError::Validation("Malformed Range header".to_string()))
        })
        .transpose()?;

    let resolution = range::resolve(range_header, media.total_len())
        .map_err(|e| AppError::Validation(format!("Malformed Range header: {}", e)))?;

    tracing::info!(
        "📥 Streaming {}/{} ({} bytes) - {:?}",
        language,
        filename,
        media.total_len(),
        resolution
    );

    media.into_response(resolution).await
}

/// A file being written into the upload directory.
///
/// Removed unless `commit` moved it into place. Error paths call `discard`;
/// a guard dropped without either hands the removal to the runtime.
struct PendingUpload {
    part_path: PathBuf,
    id: String,
    size: u64,
    settled: bool,
}

impl PendingUpload {
    async fn commit(mut self, upload_dir: &FsPath) -> Result<String> {
        let final_path = upload_dir.join(&self.id);
        tokio::fs::rename(&self.part_path, &final_path).await?;
        self.settled = true;
        Ok(std::mem::take(&mut self.id))
    }

    async fn discard(mut self) {
        self.settled = true;
        remove_upload(std::mem::take(&mut self.part_path)).await;
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let part_path = std::mem::take(&mut self.part_path);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(remove_upload(part_path));
            }
            Err(_) => {
                tracing::warn!("⚠️ No runtime to remove {}", part_path.display());
            }
        }
    }
}

async fn remove_upload(path: PathBuf) {
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!("⚠️ Failed to remove {}: {}", path.display(), e);
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::Multipart(format!("Parse error: {}", e.body_text()))
    }
}

async fn write_upload(
    upload_dir: &FsPath,
    mut field: axum::extract::multipart::Field<'_>,
) -> Result<PendingUpload> {
    tokio::fs::create_dir_all(upload_dir).await?;

    let id = Uuid::new_v4().simple().to_string();
    let part_path = upload_dir.join(format!("{}.{}", id, PART_SUFFIX));
    let file = tokio::fs::File::create(&part_path).await?;

    let mut pending = PendingUpload {
        part_path,
        id,
        size: 0,
        settled: false,
    };

    let written = async {
        let mut writer = BufWriter::new(file);
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            writer.write_all(&chunk).await?;
            pending.size += chunk.len() as u64;
        }
        writer.flush().await?;
        Ok::<_, AppError>(())
    }
    .await;

    match written {
        Ok(()) => Ok(pending),
        Err(e) => {
            pending.discard().await;
            Err(e)
        }
    }
}

/// Reads the upload form, keeping the first file and the owner email.
async fn read_upload_form(
    multipart: &mut Multipart,
    upload_dir: &FsPath,
    email: &mut Option<String>,
    upload: &mut Option<PendingUpload>,
) -> Result<()> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            EMAIL_FIELD => {
                *email = Some(field.text().await.map_err(multipart_error)?);
            }
            UPLOAD_FIELD if upload.is_none() => {
                let has_file = field.file_name().is_some_and(|name| !name.is_empty());
                if has_file {
                    *upload = Some(write_upload(upload_dir, field).await?);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn upload_owner(email: Option<String>, user: &AuthenticatedUser) -> Result<String> {
    match email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) {
        Some(email) => {
            let owner = UploadOwner { email };
            owner
                .validate()
                .map_err(|e| AppError::Validation(format!("Invalid email: {}", e)))?;
            Ok(owner.email)
        }
        None => Ok(user.subject.clone()),
    }
}

/// Stores an uploaded file and records it against the user.
pub async fn upload_music(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    tracing::info!("📤 Upload from user: {}", user.subject);

    let upload_dir = state.config.upload_dir.as_path();
    let mut email: Option<String> = None;
    let mut upload: Option<PendingUpload> = None;

    if let Err(e) = read_upload_form(&mut multipart, upload_dir, &mut email, &mut upload).await {
        if let Some(upload) = upload {
            upload.discard().await;
        }
        return Err(e);
    }

    let upload = upload.ok_or(AppError::MissingUpload)?;

    let owner = match upload_owner(email, &user) {
        Ok(owner) => owner,
        Err(e) => {
            upload.discard().await;
            return Err(e);
        }
    };

    let size = upload.size;
    let filename = upload.commit(upload_dir).await?;

    tracing::debug!("📋 Stored upload {} ({} bytes) for {}", filename, size, owner);

    if let Err(e) = state.store.record_upload(&owner, &filename).await {
        remove_upload(upload_dir.join(&filename)).await;
        return Err(e);
    }

    tracing::info!("✅ Upload recorded for {}: {}", owner, filename);

    Ok(json_response(
        StatusCode::OK,
        message_body("Payment screenshot uploaded successfully"),
    ))
}
