use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::{error, info};

use duet_db::BlobStore;
use duet_types::api::{Claims, UploadResponse};

use crate::auth::AppState;

/// 20 MB upload limit for memory images
pub const MAX_BLOB_SIZE: usize = 20 * 1024 * 1024;

/// PUT /storage/memories/{name}: raw image bytes, stored under `name`.
pub async fn upload_memory(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(name): Path<String>,
    bytes: Bytes,
) -> Result<impl IntoResponse, StatusCode> {
    if bytes.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    if bytes.len() > MAX_BLOB_SIZE {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    BlobStore::validate_name(&name).map_err(|_| StatusCode::BAD_REQUEST)?;

    let public_url = state.blobs.put(&name, &bytes).await.map_err(|e| {
        error!("Failed to store blob {}: {}", name, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    info!("{} portal uploaded memory image {}", claims.sub, name);

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse { name, public_url }),
    ))
}

/// GET /storage/memories/{name}: public download.
pub async fn download_memory(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    BlobStore::validate_name(&name).map_err(|_| StatusCode::BAD_REQUEST)?;

    let bytes = state
        .blobs
        .get(&name)
        .await
        .map_err(|e| {
            error!("Failed to read blob {}: {}", name, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(([(header::CONTENT_TYPE, content_type(&name))], bytes))
}

fn content_type(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
