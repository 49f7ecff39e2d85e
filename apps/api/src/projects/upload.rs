//! Project creation from an uploaded script file (plain text or PDF).
//!
//! Flow: read multipart → extract text → archive original to S3 → insert project.
//! The archive write and the insert are not transactional; a failed insert leaves
//! an orphaned object in the bucket.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::project::ProjectRow;
use crate::projects::handlers::validate_project_name;
use crate::projects::store::{insert_project, NewProject};
use crate::script::analyzer::MAX_SCRIPT_BYTES;
use crate::state::AppState;

/// Upload bodies may be larger than the default 2 MB axum limit (PDF scripts).
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFormat {
    Pdf,
    PlainText,
}

impl ScriptFormat {
    /// Picks the format from the file extension, falling back to the declared content type.
    pub fn detect(file_name: &str, content_type: Option<&str>) -> Self {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".pdf") || content_type == Some("application/pdf") {
            ScriptFormat::Pdf
        } else {
            ScriptFormat::PlainText
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ScriptFormat::Pdf => "application/pdf",
            ScriptFormat::PlainText => "text/plain; charset=utf-8",
        }
    }
}

struct UploadedFile {
    file_name: String,
    format: ScriptFormat,
    bytes: Bytes,
}

/// Extracts script text from the uploaded bytes.
pub async fn extract_script_text(format: ScriptFormat, bytes: Bytes) -> Result<String, AppError> {
    let text = match format {
        ScriptFormat::PlainText => String::from_utf8(bytes.to_vec()).map_err(|_| {
            AppError::Validation("Script file must be UTF-8 text or a PDF.".to_string())
        })?,
        ScriptFormat::Pdf => tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes)
        })
        .await
        // lopdf can panic on damaged files; treat that like any unreadable PDF.
        .map_err(|_| AppError::Validation("Could not read PDF script.".to_string()))?
        .map_err(|e| AppError::Validation(format!("Could not read PDF script: {e}")))?,
    };

    // PDF extraction leaves form feeds between pages.
    let text = text.replace('\u{c}', "\n");
    if text.trim().is_empty() {
        return Err(AppError::Validation(
            "Script file contains no readable text.".to_string(),
        ));
    }
    if text.len() > MAX_SCRIPT_BYTES {
        return Err(AppError::Validation(format!(
            "Script is too long ({} bytes).",
            text.len()
        )));
    }
    Ok(text)
}

/// POST /projects/upload
///
/// Multipart fields: `name` (text) and `script_file` (file).
pub async fn handle_upload_project(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ProjectRow>), AppError> {
    let mut name: Option<String> = None;
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("name") => {
                name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(format!("Malformed name field: {e}")))?,
                );
            }
            Some("script_file") => {
                let file_name = field.file_name().unwrap_or("script.txt").to_string();
                let format = ScriptFormat::detect(&file_name, field.content_type());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Malformed script file: {e}")))?;
                file = Some(UploadedFile {
                    file_name,
                    format,
                    bytes,
                });
            }
            other => warn!("Ignoring unexpected upload field {other:?}"),
        }
    }

    let name = name.unwrap_or_default();
    let name = validate_project_name(&name)?;
    let file = file.ok_or_else(|| AppError::Validation("script_file is required.".to_string()))?;
    if file.bytes.is_empty() {
        return Err(AppError::Validation("script_file is empty.".to_string()));
    }

    let script_text = extract_script_text(file.format, file.bytes.clone()).await?;

    let project_id = Uuid::new_v4();
    let key = state
        .archive
        .put_script(project_id, &file.file_name, file.format.content_type(), file.bytes)
        .await?;

    let project = insert_project(
        &state.db,
        NewProject {
            id: project_id,
            name,
            script_text: &script_text,
            analysis: None,
            genre: None,
            logline: None,
            script_file_key: Some(&key),
        },
    )
    .await?;

    info!(
        "Project {} created from upload {} ({:?})",
        project.id, file.file_name, file.format
    );
    Ok((StatusCode::CREATED, Json(project)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension_and_content_type() {
        assert_eq!(ScriptFormat::detect("draft.PDF", None), ScriptFormat::Pdf);
        assert_eq!(
            ScriptFormat::detect("blob", Some("application/pdf")),
            ScriptFormat::Pdf
        );
        assert_eq!(
            ScriptFormat::detect("draft.fountain", Some("text/plain")),
            ScriptFormat::PlainText
        );
    }

    #[tokio::test]
    async fn test_plain_text_extraction() {
        let text = extract_script_text(
            ScriptFormat::PlainText,
            Bytes::from_static(b"INT. OFFICE - DAY\nJOHN: Hello."),
        )
        .await
        .unwrap();
        assert!(text.starts_with("INT. OFFICE"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_rejected() {
        let err = extract_script_text(ScriptFormat::PlainText, Bytes::from_static(&[0xff, 0xfe, 0x00]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_blank_file_is_rejected() {
        let err = extract_script_text(ScriptFormat::PlainText, Bytes::from_static(b" \n\x0c "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_garbage_pdf_is_a_validation_error() {
        let err = extract_script_text(ScriptFormat::Pdf, Bytes::from_static(b"not a pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
