//! HTTP surface (feature `server`).
//!
//! | Route | Operation |
//! |-------|-----------|
//! | `GET /` | liveness |
//! | `POST /upload` | multipart field `files`, one part per file |
//! | `POST /process` | JSON composition request |
//! | `GET /download/:id/:filename` | composed output as an attachment |
//! | `GET /preview/:id` | canonical source inline |

use crate::compose::{default_output_name, CompositionRequest, PageReference, Rotation};
use crate::error::{DocWeaveError, ErrorClass};
use crate::ingest::Upload;
use crate::service::DocWeave;
use crate::store::DocumentId;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Largest accepted upload request body.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

type AppState = Arc<DocWeave>;

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct UploadedFile {
    id: DocumentId,
    original_name: String,
    /// Lower-cased extension of the uploaded file.
    #[serde(rename = "type")]
    kind: String,
    pages: usize,
}

#[derive(Serialize)]
struct UploadResponse {
    files: Vec<UploadedFile>,
    rejected: Vec<crate::ingest::RejectedFile>,
}

#[derive(Debug, Deserialize)]
struct PageOperation {
    file_id: String,
    /// Signed so a negative index gets a structured 400 rather than a
    /// plain-text extractor rejection.
    page_index: i64,
    #[serde(default)]
    rotation: i64,
}

#[derive(Debug, Deserialize)]
struct ProcessRequest {
    pages: Vec<PageOperation>,
    #[serde(default = "default_output_name")]
    output_name: String,
}

#[derive(Serialize)]
struct ProcessResponse {
    download_url: String,
    id: DocumentId,
    filename: String,
    pages: usize,
    skipped: Vec<crate::compose::SkippedReference>,
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    failures: Option<Vec<crate::compose::SkippedReference>>,
}

// ── Errors ───────────────────────────────────────────────────────────────

/// A [`DocWeaveError`] on its way out as an HTTP response.
struct ApiError {
    status: StatusCode,
    error: DocWeaveError,
}

impl From<DocWeaveError> for ApiError {
    fn from(error: DocWeaveError) -> Self {
        let status = match error.status_class() {
            ErrorClass::Input => StatusCode::BAD_REQUEST,
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::Conversion => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorClass::Resource => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, error }
    }
}

impl ApiError {
    fn bad_request(error: DocWeaveError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed: {}", self.error);
        } else {
            debug!("Request rejected ({}): {}", self.status, self.error);
        }
        let detail = self.error.public_message();
        let failures = match self.error {
            DocWeaveError::NoValidPages { failures } => Some(failures),
            _ => None,
        };
        (self.status, Json(ErrorResponse { detail, failures })).into_response()
    }
}

// ── Router ───────────────────────────────────────────────────────────────

/// Build the application router.
pub fn router(service: Arc<DocWeave>) -> Router {
    let cors = cors_layer(&service.config().allowed_origins);
    Router::new()
        .route("/", get(root))
        .route("/upload", post(upload))
        .route("/process", post(process))
        .route("/download/:id/:filename", get(download))
        .route("/preview/:id", get(preview))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(service: Arc<DocWeave>, shutdown: CancellationToken) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(service.config().bind_addr).await?;
    info!("DocWeave listening on {}", listener.local_addr()?);
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "DocWeave API is running",
    })
}

async fn upload(
    State(service): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::bad_request(DocWeaveError::InvalidRequest {
            detail: format!("malformed multipart body: {e}"),
        })
    })? {
        if field.name() != Some("files") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| {
            ApiError::bad_request(DocWeaveError::InvalidRequest {
                detail: format!("could not read '{filename}': {e}"),
            })
        })?;
        uploads.push(Upload::new(filename, bytes.to_vec()));
    }

    let report = service.ingest(uploads).await;
    let files = report
        .files
        .into_iter()
        .map(|f| UploadedFile {
            kind: f
                .original_name
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_ascii_lowercase())
                .unwrap_or_default(),
            id: f.id,
            original_name: f.original_name,
            pages: f.pages,
        })
        .collect();
    Ok(Json(UploadResponse {
        files,
        rejected: report.rejected,
    }))
}

/// Decode the wire request. Rotations outside {0, 90, 180, 270}, negative
/// page indices and identifiers the store could never have issued reject the
/// whole request.
fn decode_process(request: ProcessRequest) -> Result<CompositionRequest, DocWeaveError> {
    let pages = request
        .pages
        .into_iter()
        .map(|op| -> Result<PageReference, DocWeaveError> {
            Ok(PageReference {
                document_id: op.file_id.parse()?,
                page_index: usize::try_from(op.page_index).map_err(|_| DocWeaveError::InvalidRequest {
                    detail: format!("page_index must be non-negative, got {}", op.page_index),
                })?,
                rotation: Rotation::try_from(op.rotation)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CompositionRequest {
        pages,
        output_name: request.output_name,
    })
}

async fn process(
    State(service): State<AppState>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        ApiError::bad_request(DocWeaveError::InvalidRequest { detail: e.body_text() })
    })?;
    let request = decode_process(request).map_err(ApiError::bad_request)?;
    let outcome = service.compose(request).await?;
    Ok(Json(ProcessResponse {
        download_url: outcome.handle.download_path(),
        id: outcome.handle.id,
        filename: outcome.handle.filename,
        pages: outcome.pages,
        skipped: outcome.skipped,
    }))
}

async fn download(
    State(service): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let bytes = service.retrieve(&id, &filename).await?;
    // The name matched the stored, sanitized name, so it is header-safe.
    let disposition = format!("attachment; filename=\"{filename}\"");
    Ok(pdf_response(bytes, &disposition))
}

async fn preview(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = service.preview(&id).await?;
    Ok(pdf_response(bytes, "inline"))
}

fn pdf_response(bytes: Vec<u8>, disposition: &str) -> Response {
    let disposition =
        HeaderValue::from_str(disposition).unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}
