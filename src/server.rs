//! HTTP front end
//!
//! `GET /` answers a liveness string, `POST /sync-list` turns an inventory
//! into a need-upload list, `POST /upload` stores multipart uploads.
//! Upload parts are staged into anonymous temp files while the request is
//! read, so the index lock is only taken once the whole form has arrived.

use anyhow::{Context, Result};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use crate::error::ApiError;
use crate::receive::{IncomingFile, UploadReport};
use crate::service::BackupService;
use crate::wire::{attach_fields, parse_inventory, render_need_list, DocFormat, FormPart, UploadFields};

pub const STATUS_TEXT: &str = "AuroraSync server running.";

pub fn router(service: Arc<BackupService>) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/sync-list", post(sync_list))
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::disable())
        .with_state(service)
}

pub async fn serve(bind: &str, service: Arc<BackupService>) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("bind {}", bind))?;
    serve_listener(listener, service).await
}

/// Serve on an already-bound listener until Ctrl-C.
pub async fn serve_listener(listener: TcpListener, service: Arc<BackupService>) -> Result<()> {
    let addr = listener.local_addr()?;
    service.logger().start(&addr.to_string(), service.root());
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("http server")?;
    Ok(())
}

async fn status() -> &'static str {
    STATUS_TEXT
}

fn internal(service: &BackupService, context: &str, err: anyhow::Error) -> ApiError {
    service.logger().error(context, &format!("{err:#}"));
    ApiError::Internal(err)
}

async fn sync_list(
    State(service): State<Arc<BackupService>>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, ApiError> {
    if body.trim().is_empty() {
        return Err(ApiError::bad_request("Empty body"));
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let format = DocFormat::detect(content_type, &body);
    let files =
        parse_inventory(&body, format).map_err(|e| ApiError::bad_request(format!("{e:#}")))?;

    // planning waits on the index lock, which an upload batch may hold
    let worker = Arc::clone(&service);
    let needed = tokio::task::spawn_blocking(move || worker.plan(&files))
        .await
        .map_err(|e| internal(&service, "sync-list", e.into()))?;
    let doc = render_need_list(&needed, format).map_err(|e| internal(&service, "sync-list", e))?;
    Ok(([(header::CONTENT_TYPE, format.content_type())], doc).into_response())
}

/// A file part spooled to disk
struct StagedFile {
    file: File,
    file_name: String,
}

/// Spool every part of the form. Each staged file keeps its descriptor open
/// until the batch has been stored; the number of parts is not limited.
async fn read_parts(multipart: &mut Multipart) -> Result<Vec<FormPart<StagedFile>>> {
    let mut parts = Vec::new();
    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let mut staged = tokio::fs::File::from_std(tempfile::tempfile()?);
                while let Some(chunk) = field.chunk().await? {
                    staged.write_all(&chunk).await?;
                }
                staged.flush().await?;
                let mut file = staged.into_std().await;
                file.seek(SeekFrom::Start(0))?;
                parts.push(FormPart::File(StagedFile { file, file_name }));
            }
            None => {
                let value = field.text().await?;
                parts.push(FormPart::Field(name, value));
            }
        }
    }
    Ok(parts)
}

fn incoming(staged: StagedFile, fields: UploadFields) -> IncomingFile {
    IncomingFile {
        last_modified: fields.last_modified_ms(),
        size: fields.reported_size(),
        reader: Box::new(staged.file),
        file_name: staged.file_name,
        rel: fields.rel.unwrap_or_default(),
        path: fields.filepath.unwrap_or_default(),
    }
}

async fn upload(
    State(service): State<Arc<BackupService>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadReport>, ApiError> {
    let mut multipart =
        multipart.map_err(|_| ApiError::bad_request("Expected multipart/form-data"))?;
    let parts = read_parts(&mut multipart)
        .await
        .map_err(|e| internal(&service, "upload", e))?;

    let files: Vec<IncomingFile> = attach_fields(parts)
        .into_iter()
        .map(|(staged, fields)| incoming(staged, fields))
        .collect();
    if files.is_empty() {
        return Err(ApiError::bad_request("No files uploaded."));
    }

    let worker = Arc::clone(&service);
    match tokio::task::spawn_blocking(move || worker.receive(files)).await {
        Ok(Ok(report)) => Ok(Json(report)),
        Ok(Err(e)) => Err(internal(&service, "upload", e)),
        Err(e) => Err(internal(&service, "upload", e.into())),
    }
}
