//! Image quality endpoint

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use shared::QualityReport;

use crate::error::{AppError, AppResult};
use crate::services::quality::assess_quality;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct QualityResponse {
    pub content_type: Option<String>,
    pub quality: QualityReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_preview: Option<Value>,
}

/// Assess the quality of an uploaded image. With `include_ocr_preview`,
/// attach a short OCR sample; preview failures degrade to an error object
/// instead of failing the request.
pub async fn quality(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<QualityResponse>> {
    let mut file_bytes: Vec<u8> = Vec::new();
    let mut content_type: Option<String> = None;
    let mut include_ocr_preview = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("invalid multipart body: {e}"), "Cuerpo multipart inválido"))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                content_type = field.content_type().map(str::to_string);
                file_bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("file: {e}"), "Archivo inválido"))?
                    .to_vec();
            }
            "include_ocr_preview" => {
                let value = field.text().await.unwrap_or_default();
                include_ocr_preview =
                    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1");
            }
            _ => {}
        }
    }

    if file_bytes.is_empty() {
        return Err(AppError::validation("empty file", "Archivo vacío"));
    }

    let report = assess_quality(&file_bytes, content_type.as_deref())?;

    let ocr_preview = if include_ocr_preview {
        let ct = content_type.as_deref().or(Some("application/octet-stream"));
        match state.ocr.recognize(file_bytes, ct).await {
            Ok(export) => {
                let sample: String = export.flatten_text().chars().take(200).collect();
                Some(json!({
                    "words": export.word_count(),
                    "text_sample": sample,
                }))
            }
            Err(e) => {
                tracing::error!("OCR preview error: {e}");
                Some(json!({"error": "No se pudo generar el preview"}))
            }
        }
    } else {
        None
    };

    Ok(Json(QualityResponse {
        content_type,
        quality: report,
        ocr_preview,
    }))
}
