//! API handlers for the HEXON server
//!
//! Provides REST endpoints for:
//! - Merge, split and compression of uploaded PDFs
//! - Image-to-PDF
//! - Office document conversion
//!
//! Document work runs on the blocking pool under the configured timeout.
//! Artifacts are persisted only after the work has finished in time.

use std::time::Duration;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use hexon_core::{
    compress, convert_document, images_to_pdf, merge, split, CompressionProfile, HexonError,
    ImageInput, MergePlan, SizeStats, SourceDocument, SourceFormat, SplitRequest,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::ServerError;
use crate::storage::Persisted;
use crate::upload::{Upload, UploadedFile};
use crate::AppState;

/// Run document work on the blocking pool, giving up after `timeout_ms`
async fn run_blocking<T, F>(timeout_ms: u64, job: F) -> Result<T, ServerError>
where
    F: FnOnce() -> Result<T, HexonError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        tokio::task::spawn_blocking(job),
    )
    .await;

    match result {
        Ok(Ok(outcome)) => outcome.map_err(ServerError::from),
        Ok(Err(join_error)) => Err(ServerError::Internal(format!(
            "Document task panicked: {}",
            join_error
        ))),
        Err(_timeout) => {
            warn!(timeout_ms, "Document task timed out");
            Err(ServerError::Timeout(timeout_ms))
        }
    }
}

/// Load an upload, naming it in the error when it is not a PDF
fn load_upload(file: &UploadedFile) -> Result<SourceDocument, HexonError> {
    SourceDocument::load(&file.bytes).map_err(|e| match e {
        HexonError::ParseError(msg) => {
            HexonError::ParseError(format!("{}: {}", file.display_name(), msg))
        }
        other => other,
    })
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /
pub async fn handle_root() -> &'static str {
    "HEXON Backend server running successfully!"
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "hexon-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Response for operations producing one artifact
#[derive(Debug, Serialize)]
pub struct PathResponse {
    pub path: String,
}

/// Handler: POST /merge
pub async fn handle_merge(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PathResponse>, ServerError> {
    let mut upload = Upload::read(multipart).await?;
    let files = upload.take_files("files");
    info!("Merge request: {} files", files.len());

    let artifact = run_blocking(state.timeout_ms, move || {
        let sources = files
            .iter()
            .map(load_upload)
            .collect::<Result<Vec<_>, _>>()?;
        let plan = MergePlan::new(sources)?;
        info!(pages = plan.total_pages(), "Merging {} documents", plan.sources().len());
        merge(plan.sources())
    })
    .await?;

    let path = state.store.persist_one(artifact).await?;
    Ok(Json(PathResponse { path }))
}

/// One produced split output
#[derive(Debug, Serialize)]
pub struct SplitResult {
    pub name: String,
    pub path: String,
    pub pages: u32,
}

/// One split output that failed
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitFailure {
    pub name: String,
    pub error_kind: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitResponse {
    pub total_pages: u32,
    pub results: Vec<SplitResult>,
    pub failures: Vec<SplitFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

/// Handler: POST /split-pdf
pub async fn handle_split(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SplitResponse>, ServerError> {
    let mut upload = Upload::read(multipart).await?;
    let file = upload.take_file("file")?;
    let request = SplitRequest {
        split_type: upload.take_field("splitType"),
        start_page: upload.take_field("startPage"),
        end_page: upload.take_field("endPage"),
        page_ranges: upload.take_field("pageRanges"),
    };
    info!(
        "Split request: file={}, type={:?}",
        file.display_name(),
        request.split_type
    );

    let report = run_blocking(state.timeout_ms, move || {
        let source = load_upload(&file)?;
        let plan = request.plan_for(&source)?;
        split(&source, &plan)
    })
    .await?;
    if let Some(err) = report.partial_failure() {
        warn!(%err, "Split finished with failed outputs");
    }

    let failures = report
        .failures
        .iter()
        .map(|f| SplitFailure {
            name: f.label.clone(),
            error_kind: f.error.kind().as_str(),
            message: f.error.to_string(),
        })
        .collect();

    let (labels, artifacts): (Vec<String>, Vec<_>) = report
        .outputs
        .into_iter()
        .map(|o| (o.label, o.artifact))
        .unzip();
    let persisted = state.store.persist_all(artifacts).await?;

    let response = split_response(report.total_pages, failures, labels.into_iter().zip(persisted))?;
    Ok(Json(response))
}

/// Combine written split outputs with every failure met along the way
///
/// A failed write is reported next to the failed outputs. Fails only when
/// nothing could be written.
pub(crate) fn split_response(
    total_pages: u32,
    mut failures: Vec<SplitFailure>,
    persisted: impl IntoIterator<Item = (String, Persisted)>,
) -> Result<SplitResponse, ServerError> {
    let mut results = Vec::new();
    let mut first_error = None;

    for (name, Persisted { artifact, path }) in persisted {
        match path {
            Ok(path) => results.push(SplitResult {
                name,
                path,
                pages: artifact.page_count,
            }),
            Err(err) => {
                failures.push(SplitFailure {
                    name,
                    error_kind: err.kind(),
                    message: err.to_string(),
                });
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    if results.is_empty() {
        if let Some(err) = first_error {
            return Err(err);
        }
    }

    let error_kind = (!failures.is_empty()).then(|| {
        HexonError::PartialSplitFailure {
            succeeded: results.len(),
            failed: failures.len(),
        }
        .kind()
        .as_str()
    });

    Ok(SplitResponse {
        total_pages,
        results,
        failures,
        error_kind,
    })
}

#[derive(Debug, Serialize)]
pub struct CompressResponse {
    pub path: String,
    #[serde(flatten)]
    pub stats: SizeStats,
}

/// Handler: POST /compress-pdf
pub async fn handle_compress(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CompressResponse>, ServerError> {
    let mut upload = Upload::read(multipart).await?;
    let file = upload.take_file("file")?;
    let profile = match upload.field("compressionLevel") {
        Some(level) if !level.trim().is_empty() => level.parse::<CompressionProfile>()?,
        _ => CompressionProfile::default(),
    };
    info!(
        "Compress request: file={}, level={}",
        file.display_name(),
        profile.as_str()
    );

    let report = run_blocking(state.timeout_ms, move || {
        let source = load_upload(&file)?;
        compress(&source, profile)
    })
    .await?;

    let stats = report.size_stats();
    let path = state.store.persist_one(report.artifact).await?;
    Ok(Json(CompressResponse { path, stats }))
}

/// Handler: POST /image-to-pdf
pub async fn handle_image_to_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PathResponse>, ServerError> {
    let mut upload = Upload::read(multipart).await?;
    let images: Vec<ImageInput> = upload
        .take_files("images")
        .into_iter()
        .map(|f| ImageInput {
            name: f.display_name().to_string(),
            mime_type: f.content_type,
            bytes: f.bytes,
        })
        .collect();
    info!("Image-to-PDF request: {} images", images.len());

    let artifact = run_blocking(state.timeout_ms, move || images_to_pdf(&images)).await?;
    let path = state.store.persist_one(artifact).await?;
    Ok(Json(PathResponse { path }))
}

async fn convert_upload(
    state: AppState,
    multipart: Multipart,
    format: SourceFormat,
) -> Result<Json<PathResponse>, ServerError> {
    let mut upload = Upload::read(multipart).await?;
    let file = upload.take_file("file")?;
    info!(
        "Convert request: file={}, format={}",
        file.display_name(),
        format.as_str()
    );

    let converter = state.converter.clone();
    let artifact = run_blocking(state.timeout_ms, move || {
        convert_document(converter.as_ref(), &file.bytes, format, file.filename.as_deref())
    })
    .await?;

    let path = state.store.persist_one(artifact).await?;
    Ok(Json(PathResponse { path }))
}

/// Handler: POST /doc-to-pdf
pub async fn handle_doc_to_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PathResponse>, ServerError> {
    convert_upload(state, multipart, SourceFormat::Word).await
}

/// Handler: POST /excel-to-pdf
pub async fn handle_excel_to_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PathResponse>, ServerError> {
    convert_upload(state, multipart, SourceFormat::Excel).await
}

/// Handler: POST /powerpoint-to-pdf
pub async fn handle_powerpoint_to_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PathResponse>, ServerError> {
    convert_upload(state, multipart, SourceFormat::PowerPoint).await
}

/// Handler: POST /html-to-pdf
pub async fn handle_html_to_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PathResponse>, ServerError> {
    convert_upload(state, multipart, SourceFormat::Html).await
}

/// Handler: POST /extract-images
pub async fn handle_extract_images() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(json!({
            "message": "Image extraction feature is temporarily under development. Please try again later."
        })),
    )
}
