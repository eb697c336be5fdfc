//! Upload, listing and download routes.

use anyhow::{Context, Result};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::metrics;
use super::state::GuardedFileStore;
use crate::file_store::FileStore;

const UPLOAD_FIELD_NAME: &str = "file";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Store calls block on SQLite, keep them off the async workers.
pub(super) async fn run_blocking<T, F>(store: GuardedFileStore, f: F) -> Result<T>
where
    F: FnOnce(&dyn FileStore) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .context("Store task failed")?
}

pub async fn list_files(State(store): State<GuardedFileStore>) -> Response {
    match run_blocking(store, |store| store.list_all()).await {
        Ok(summaries) => Json(summaries).into_response(),
        Err(err) => {
            error!("Failed to list files: {:#}", err);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to list files: {:#}", err),
            )
        }
    }
}

pub async fn upload_file(
    State(store): State<GuardedFileStore>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            debug!("Upload without a multipart body: {}", rejection.body_text());
            metrics::record_upload_failure("rejected");
            return error_response(StatusCode::BAD_REQUEST, "No file found in request");
        }
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                warn!("Failed to read multipart body: {}", err.body_text());
                metrics::record_upload_failure("rejected");
                return error_response(err.status(), err.body_text());
            }
        };

        // Form fields without a filename are plain values, not files
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if filename.is_empty() {
            metrics::record_upload_failure("rejected");
            return error_response(StatusCode::BAD_REQUEST, "No file selected");
        }

        let content = match field.bytes().await {
            Ok(content) => content,
            Err(err) => {
                warn!("Failed to read upload {}: {}", filename, err.body_text());
                metrics::record_upload_failure("rejected");
                return error_response(err.status(), err.body_text());
            }
        };

        let size = content.len();
        let name = filename.clone();
        let inserted = run_blocking(store, move |store| store.insert(&name, &content)).await;
        return match inserted {
            Ok(record) => {
                info!(
                    "Stored file {} as id {} ({:#})",
                    record.filename,
                    record.id,
                    byte_unit::Byte::from(size)
                );
                metrics::record_upload(size);
                (
                    StatusCode::OK,
                    Json(json!({
                        "message": "File uploaded successfully",
                        "id": record.id,
                    })),
                )
                    .into_response()
            }
            Err(err) => {
                error!("Failed to save file {}: {:#}", filename, err);
                metrics::record_upload_failure("failed");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to save file: {:#}", err),
                )
            }
        };
    }

    metrics::record_upload_failure("rejected");
    error_response(StatusCode::BAD_REQUEST, "No file found in request")
}

/// Answers plain OPTIONS requests; CORS preflights are handled by the CORS layer.
pub async fn upload_options() -> StatusCode {
    StatusCode::OK
}

fn content_disposition(filename: &str) -> HeaderValue {
    let sanitized: String = filename
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", sanitized))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

pub async fn download_file(
    State(store): State<GuardedFileStore>,
    Path(id): Path<i64>,
) -> Response {
    let record = match run_blocking(store, move |store| store.get(id)).await {
        Ok(Some(record)) => record,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to read file {}: {:#}", id, err);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read file: {:#}", err),
            );
        }
    };

    let content_type = infer::get(&record.content)
        .map(|kind| kind.mime_type())
        .unwrap_or(FALLBACK_CONTENT_TYPE);

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&record.filename),
            ),
        ],
        record.content,
    )
        .into_response()
}
