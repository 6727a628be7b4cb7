//! Document extraction endpoint

use axum::extract::{Multipart, State};
use axum::Json;

use shared::{DocType, ExtractRecord};

use crate::error::{AppError, AppResult};
use crate::services::{ExtractRequest, ExtractionService};
use crate::AppState;

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1")
}

/// Extract fields from an uploaded document.
///
/// Multipart form: `usuarioID` (required), `tipo_documento` (defaults to
/// auto-detection), `file` (required), `debug` (optional).
pub async fn extract(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<ExtractRecord>> {
    let mut usuario_id = String::new();
    let mut tipo_documento: Option<DocType> = None;
    let mut debug = false;
    let mut file_bytes: Vec<u8> = Vec::new();
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("invalid multipart body: {e}"), "Cuerpo multipart inválido"))?
    {
        match field.name().unwrap_or("") {
            "usuarioID" => {
                usuario_id = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation(format!("usuarioID: {e}"), "usuarioID inválido"))?;
            }
            "tipo_documento" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation(format!("tipo_documento: {e}"), "tipo_documento inválido"))?;
                tipo_documento = DocType::parse(&value);
            }
            "debug" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation(format!("debug: {e}"), "debug inválido"))?;
                debug = parse_bool(&value);
            }
            "file" => {
                content_type = field.content_type().map(str::to_string);
                file_bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("file: {e}"), "Archivo inválido"))?
                    .to_vec();
            }
            other => {
                tracing::debug!(field = other, "ignoring unknown multipart field");
            }
        }
    }

    let service = ExtractionService::new(
        state.config.clone(),
        state.ocr.clone(),
        state.store.clone(),
        state.templates.clone(),
    );
    let record = service
        .extract(ExtractRequest {
            usuario_id,
            tipo_documento,
            file_bytes,
            content_type,
            debug,
        })
        .await?;
    Ok(Json(record))
}
