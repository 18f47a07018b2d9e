use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Form, Multipart, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::ApiError;
use super::session::{self, BatchStatus, StoredDocument};
use super::{AppState, SessionId};
use crate::document::{self, DocumentKind, SourceDocument};
use crate::export::Table;
use crate::pipeline;

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    name: String,
    date: String,
    records: usize,
    table: Table,
}

#[derive(Serialize)]
pub struct BatchResponse {
    processed: usize,
    failed: Vec<FailedDocument>,
    table: Table,
}

#[derive(Serialize)]
pub struct FailedDocument {
    name: String,
    error: String,
}

#[derive(Serialize)]
pub struct ProgressResponse {
    running: bool,
    complete: bool,
}

struct Upload {
    name: String,
    bytes: Vec<u8>,
}

pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let logged_in = match cookie_session(&headers) {
        Some(id) => state.sessions.touch(id).await,
        None => false,
    };
    Html(super::page::render(logged_in))
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    if !session::password_matches(state.password_hash.as_ref(), &form.password) {
        warn!("Rejected login attempt");
        return Err(ApiError::Unauthorized);
    }

    let id = state.sessions.create().await;
    info!("Login accepted");
    Ok(redirect_home(session::session_cookie(&id)))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = cookie_session(&headers) {
        state.sessions.remove(id).await;
    }
    redirect_home(session::cleared_cookie())
}

/// Process one PDF and keep it, and its table, in the session for review.
pub async fn upload(
    State(state): State<AppState>,
    Extension(SessionId(id)): Extension<SessionId>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let doc = pdf_document(single_file(multipart).await?)?;
    let processed = pipeline::process_document(&state.extractor, &doc, state.layout).await?;

    let response = UploadResponse {
        name: processed.name.clone(),
        date: processed.report.date.clone(),
        records: processed.report.records.len(),
        table: processed.table.clone(),
    };

    state
        .sessions
        .with_session(&id, |s| {
            s.document = Some(StoredDocument {
                name: doc.name,
                bytes: doc.bytes,
            });
            s.table = Some(processed.table);
        })
        .await
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(response))
}

/// Process one PDF and answer with the CSV directly.
pub async fn convert(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let doc = pdf_document(single_file(multipart).await?)?;
    let processed = pipeline::process_document(&state.extractor, &doc, state.layout).await?;
    csv_attachment(&processed.table, "test_results.csv")
}

/// Process several PDFs or zip archives into one merged table.
pub async fn batch(
    State(state): State<AppState>,
    Extension(SessionId(id)): Extension<SessionId>,
    mut multipart: Multipart,
) -> Result<Json<BatchResponse>, ApiError> {
    let mut documents = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.pdf").to_string();
        let bytes = field.bytes().await?.to_vec();
        if bytes.is_empty() {
            continue;
        }

        if document::is_zip(&bytes, &name) {
            documents.extend(document::expand_zip(&name, &bytes, state.max_expanded_bytes)?);
        } else {
            documents.push(pdf_document(Upload { name, bytes })?);
        }
    }

    if documents.is_empty() {
        return Err(ApiError::BadRequest("no PDF or zip file uploaded".to_string()));
    }

    set_batch_status(&state, &id, BatchStatus::Running).await?;
    let outcome = match pipeline::process_batch(
        state.extractor.clone(),
        documents,
        state.layout,
        state.concurrency,
        None,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            set_batch_status(&state, &id, BatchStatus::Idle).await?;
            return Err(e.into());
        }
    };

    if outcome.processed.is_empty() {
        set_batch_status(&state, &id, BatchStatus::Idle).await?;
        let reasons: Vec<String> = outcome
            .failures
            .iter()
            .map(|(name, e)| format!("{}: {}", name, e))
            .collect();
        return Err(ApiError::Extraction(reasons.join("; ")));
    }

    let table = outcome.merged_table();
    let failed = outcome
        .failures
        .iter()
        .map(|(name, e)| FailedDocument {
            name: name.clone(),
            error: e.to_string(),
        })
        .collect();

    let stored = table.clone();
    state
        .sessions
        .with_session(&id, move |s| {
            s.table = Some(stored);
            s.batch = BatchStatus::Complete;
        })
        .await
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(BatchResponse {
        processed: outcome.processed.len(),
        failed,
        table,
    }))
}

pub async fn progress(
    State(state): State<AppState>,
    Extension(SessionId(id)): Extension<SessionId>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let status = state
        .sessions
        .with_session(&id, |s| s.batch)
        .await
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(ProgressResponse {
        running: status == BatchStatus::Running,
        complete: status == BatchStatus::Complete,
    }))
}

/// The uploaded PDF, inline, for the preview pane.
pub async fn preview_document(
    State(state): State<AppState>,
    Extension(SessionId(id)): Extension<SessionId>,
) -> Result<Response, ApiError> {
    let stored = state
        .sessions
        .with_session(&id, |s| s.document.clone())
        .await
        .ok_or(ApiError::Unauthorized)?
        .ok_or_else(|| ApiError::NotFound("no document uploaded".to_string()))?;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", stored.name.replace('"', "")),
        ),
    ];
    Ok((headers, stored.bytes).into_response())
}

pub async fn get_table(
    State(state): State<AppState>,
    Extension(SessionId(id)): Extension<SessionId>,
) -> Result<Json<Table>, ApiError> {
    current_table(&state, &id).await.map(Json)
}

/// Replace the table with the reviewer's edits, sent as JSON or as CSV.
pub async fn put_table(
    State(state): State<AppState>,
    Extension(SessionId(id)): Extension<SessionId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Table>, ApiError> {
    let table = if is_csv(&headers) {
        let text = std::str::from_utf8(&body)
            .map_err(|_| ApiError::BadRequest("table is not UTF-8".to_string()))?;
        Table::from_csv(text).map_err(|e| ApiError::BadRequest(format!("{:#}", e)))?
    } else {
        serde_json::from_slice::<Table>(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid table: {}", e)))?
    };
    if table.headers.is_empty() {
        return Err(ApiError::BadRequest("table has no header".to_string()));
    }

    let stored = table.clone();
    state
        .sessions
        .with_session(&id, move |s| s.table = Some(stored))
        .await
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(table))
}

pub async fn add_row(
    State(state): State<AppState>,
    Extension(SessionId(id)): Extension<SessionId>,
) -> Result<Json<Table>, ApiError> {
    let table = state
        .sessions
        .with_session(&id, |s| {
            s.table.as_mut().map(|t| {
                t.push_empty_row();
                t.clone()
            })
        })
        .await
        .ok_or(ApiError::Unauthorized)?
        .ok_or_else(|| ApiError::NotFound("nothing processed yet".to_string()))?;
    Ok(Json(table))
}

pub async fn download(
    State(state): State<AppState>,
    Extension(SessionId(id)): Extension<SessionId>,
) -> Result<Response, ApiError> {
    let table = current_table(&state, &id).await?;
    csv_attachment(&table, "edited_results.csv")
}

async fn current_table(state: &AppState, id: &str) -> Result<Table, ApiError> {
    state
        .sessions
        .with_session(id, |s| s.table.clone())
        .await
        .ok_or(ApiError::Unauthorized)?
        .ok_or_else(|| ApiError::NotFound("nothing processed yet".to_string()))
}

async fn set_batch_status(state: &AppState, id: &str, status: BatchStatus) -> Result<(), ApiError> {
    state
        .sessions
        .with_session(id, |s| s.batch = status)
        .await
        .ok_or(ApiError::Unauthorized)
}

async fn single_file(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.pdf").to_string();
        let bytes = field.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("uploaded file is empty".to_string()));
        }
        return Ok(Upload { name, bytes });
    }
    Err(ApiError::BadRequest("no file uploaded".to_string()))
}

fn pdf_document(upload: Upload) -> Result<SourceDocument, ApiError> {
    let doc = SourceDocument::from_bytes(upload.name, upload.bytes)?;
    if doc.kind != DocumentKind::Pdf {
        return Err(ApiError::UnsupportedMedia(format!(
            "{} is {}, expected a PDF",
            doc.name,
            doc.mime_type()
        )));
    }
    Ok(doc)
}

fn is_csv(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/csv"))
}

fn csv_attachment(table: &Table, filename: &str) -> Result<Response, ApiError> {
    let csv = table.to_csv()?;
    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];
    Ok((headers, csv).into_response())
}

fn redirect_home(cookie: String) -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (header::SET_COOKIE, cookie),
        ],
    )
        .into_response()
}

pub(super) fn cookie_session(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(session::session_id_from_cookie)
}
