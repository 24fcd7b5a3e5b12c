//! Media upload and download
//!
//! Upload stores the multipart `file` field and answers with its media id;
//! download serves a stored file back by that id.

use axum::{
    Json,
    extract::{Path, State, multipart::Multipart, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::AppState;
use crate::storage::StorageError;

/// Multipart field that carries the uploaded file.
const FILE_FIELD: &str = "file";

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("multipart error: {0}")]
    Multipart(#[from] MultipartError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        match self {
            UploadError::Storage(StorageError::InvalidFileType(_)) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Invalid file type").into_response()
            }
            UploadError::Storage(StorageError::FileTooLarge { .. }) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "File too large").into_response()
            }
            UploadError::Storage(StorageError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "File not found").into_response()
            }
            UploadError::Storage(StorageError::Io(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store file").into_response()
            }
            UploadError::Multipart(e) => (e.status(), e.body_text()).into_response(),
        }
    }
}

pub async fn upload_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let started = Instant::now();
    info!("started file upload");

    match receive_upload(&state, &mut multipart).await {
        Ok(Some(media_id)) => {
            state.metrics.upload_stored();
            info!(
                seconds = started.elapsed().as_secs_f64(),
                %media_id,
                "file uploaded"
            );
            (
                StatusCode::CREATED,
                [(header::LOCATION, format!("download/{media_id}"))],
                Json(serde_json::json!({ "mediaId": media_id })),
            )
                .into_response()
        }
        Ok(None) => {
            error!("badrequest on file upload");
            (StatusCode::BAD_REQUEST, "No file uploaded").into_response()
        }
        Err(e) => {
            state.metrics.upload_rejected();
            warn!(error = %e, "upload rejected");
            e.into_response()
        }
    }
}

/// Streams the `file` field into memory, checking type up front and size as
/// chunks arrive. Returns `None` when the form has no such field.
async fn receive_upload(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<Option<String>, UploadError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let mime = field.content_type().unwrap_or_default().to_string();
        state.media.check_type(&mime)?;

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            data.extend_from_slice(&chunk);
            state.media.check_size(data.len() as u64)?;
        }

        let media_id = state.media.store(&original_name, &mime, &data).await?;
        return Ok(Some(media_id));
    }
    Ok(None)
}

pub async fn download_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    match state.media.open(&filename).await {
        Ok(media) => (
            [
                (header::CONTENT_TYPE, media.content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            media.bytes,
        )
            .into_response(),
        Err(StorageError::NotFound(_)) => (StatusCode::NOT_FOUND, "File not found").into_response(),
        Err(e) => {
            error!(%filename, error = %e, "failed to read media");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
        }
    }
}
