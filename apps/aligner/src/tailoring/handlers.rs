use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::alignment::models::JobRequirement;
use crate::alignment::requirements::{self, Seniority};
use crate::errors::AppError;
use crate::ingest::{DocumentFormat, ResumeDocument};
use crate::state::AppState;
use crate::storage::DocumentHandle;
use crate::tailoring::pipeline::{fill_suggestions, TailoringReport};

#[derive(Debug, Serialize, Deserialize)]
pub struct AlignResponse {
    pub report_handle: DocumentHandle,
    pub report: TailoringReport,
}

#[derive(Debug, Deserialize)]
pub struct RequirementsRequest {
    pub job_text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequirementsResponse {
    pub requirements: Vec<JobRequirement>,
    pub seniority: Option<Seniority>,
}

/// Multipart fields of an align request.
#[derive(Default)]
struct AlignUpload {
    resume: Option<Bytes>,
    resume_filename: Option<String>,
    resume_content_type: Option<String>,
    format: Option<String>,
    job_description: Option<String>,
    threshold: Option<String>,
}

impl AlignUpload {
    async fn read(multipart: &mut Multipart) -> Result<Self, AppError> {
        let mut upload = AlignUpload::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "resume" => {
                    upload.resume_filename = field.file_name().map(str::to_string);
                    upload.resume_content_type = field.content_type().map(str::to_string);
                    upload.resume = Some(field.bytes().await.map_err(|e| {
                        AppError::Validation(format!("Failed to read resume upload: {e}"))
                    })?);
                }
                "format" | "job_description" | "threshold" => {
                    let value = field.text().await.map_err(|e| {
                        AppError::Validation(format!("Failed to read field '{name}': {e}"))
                    })?;
                    match name.as_str() {
                        "format" => upload.format = Some(value),
                        "job_description" => upload.job_description = Some(value),
                        _ => upload.threshold = Some(value),
                    }
                }
                _ => {}
            }
        }
        Ok(upload)
    }

    /// Format precedence: explicit `format` field, then the file extension, then the
    /// part's content type.
    fn document(&mut self) -> Result<ResumeDocument, AppError> {
        let content = self
            .resume
            .take()
            .ok_or_else(|| AppError::Validation("Missing 'resume' file part".to_string()))?;

        if let Some(declared) = self.format.as_deref().filter(|f| !f.trim().is_empty()) {
            return Ok(ResumeDocument::from_declared(content, declared)?);
        }
        let format = match (&self.resume_filename, &self.resume_content_type) {
            (Some(filename), _) => DocumentFormat::from_filename(filename)?,
            (None, Some(content_type)) => content_type.parse::<DocumentFormat>()?,
            (None, None) => {
                return Err(AppError::Validation(
                    "Cannot determine resume format: send a 'format' field or a file name"
                        .to_string(),
                ))
            }
        };
        Ok(ResumeDocument::new(content, format))
    }

    fn job_text(&mut self) -> Result<String, AppError> {
        self.job_description
            .take()
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Missing 'job_description' field".to_string()))
    }

    fn threshold(&self) -> Result<Option<f32>, AppError> {
        let Some(raw) = self.threshold.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        match raw.parse::<f32>() {
            Ok(t) if (0.0..=1.0).contains(&t) => Ok(Some(t)),
            _ => Err(AppError::Validation(format!(
                "threshold must be a number within [0, 1], got '{raw}'"
            ))),
        }
    }
}

/// POST /api/v1/align
///
/// Multipart: `resume` (file), `job_description` (text), optional `format` and `threshold`.
pub async fn handle_align(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AlignResponse>, AppError> {
    let mut upload = AlignUpload::read(&mut multipart).await?;
    let document = upload.document()?;
    let job_text = upload.job_text()?;
    let threshold = upload.threshold()?;

    // Alignment is CPU-bound; keep it off the async workers.
    let engine = state.engine.clone();
    let (document, analysis) = tokio::task::spawn_blocking(move || {
        let analysis = engine.analyze(&document, &job_text, threshold);
        (document, analysis)
    })
    .await
    .map_err(|e| anyhow::anyhow!("Alignment task failed: {e}"))?;
    let analysis = analysis?;

    let resume_handle = state
        .store
        .put(document.content().clone(), document.format().mime_type())
        .await?;
    let mut report = TailoringReport::new(analysis, resume_handle);

    if let Some(generator) = &state.generator {
        let pending = std::mem::take(&mut report.suggestions);
        report.suggestions = fill_suggestions(generator.as_ref(), pending, &state.retry).await?;
    }

    let body = serde_json::to_vec(&report).map_err(anyhow::Error::from)?;
    let report_handle = state.store.put(Bytes::from(body), "application/json").await?;

    info!(
        "Stored tailoring report {report_handle} for resume {} ({} backend)",
        report.resume_handle,
        state.store.backend()
    );
    Ok(Json(AlignResponse {
        report_handle,
        report,
    }))
}

/// POST /api/v1/requirements
/// Previews what the requirement extractor reads from a job description.
pub async fn handle_requirements(
    State(state): State<AppState>,
    Json(req): Json<RequirementsRequest>,
) -> Result<Json<RequirementsResponse>, AppError> {
    if req.job_text.trim().is_empty() {
        return Err(AppError::Validation("job_text must not be empty".to_string()));
    }
    Ok(Json(RequirementsResponse {
        requirements: requirements::extract(&req.job_text, state.engine.config()),
        seniority: requirements::detect_seniority(&req.job_text),
    }))
}

/// GET /api/v1/reports/:handle
pub async fn handle_get_report(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<TailoringReport>, AppError> {
    let handle: DocumentHandle = handle.parse()?;
    let blob = state.store.get(&handle).await?;
    let report: TailoringReport = serde_json::from_slice(&blob)
        .map_err(|e| anyhow::anyhow!("Stored document {handle} is not a tailoring report: {e}"))?;
    Ok(Json(report))
}
