use axum::{
    extract::{Multipart, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::info;

use super::{required, AppState};
use crate::error::ApiError;

/// Multipart field that carries the uploaded file.
const UPLOAD_FIELD: &str = "file";

pub fn router() -> Router<AppState> {
    let collection = get(list_files).post(upload).delete(delete_file);
    Router::new()
        .route("/database", collection.clone())
        .route("/database/", collection)
        .route("/database/download", get(download))
}

#[derive(Debug, Serialize)]
pub struct FileList {
    pub files: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FileParams {
    pub file_name: Option<String>,
}

async fn list_files(State(state): State<AppState>) -> Result<Json<FileList>, ApiError> {
    let files = state.rows.list_files().await?;
    Ok(Json(FileList { files }))
}

async fn delete_file(
    State(state): State<AppState>,
    Query(params): Query<FileParams>,
) -> Result<Json<Value>, ApiError> {
    let file_name = required("file_name", params.file_name)?;
    state.rows.delete_file(&file_name).await?;
    Ok(Json(json!({ "success": format!("file {file_name} successfully deleted") })))
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<Value>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ApiError::bad_request("Uploaded file has no file name"))?;
        let data = field.bytes().await?;

        let stored = state.rows.upload(&file_name, &data).await?;
        info!(file_name = %file_name, records = stored, "upload accepted");
        return Ok(Json(json!({ "success": format!("file {file_name} successfully uploaded") })));
    }
    Err(ApiError::bad_request(&format!("Missing multipart field '{UPLOAD_FIELD}'")))
}

async fn download(
    State(state): State<AppState>,
    Query(params): Query<FileParams>,
) -> Result<Response, ApiError> {
    let file_name = required("file_name", params.file_name)?;
    let data = state.rows.download(&file_name).await?;
    let etag = format!("\"{}\"", hex::encode(Sha256::digest(&data)));

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name.replace('"', "")))
        .map_err(|_| ApiError::bad_request("file_name is not a valid header value"))?;
    let etag = HeaderValue::from_str(&etag).map_err(|_| ApiError::internal_error("invalid ETag"))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
            (header::ETAG, etag),
        ],
        data,
    )
        .into_response())
}
