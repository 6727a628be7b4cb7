//! Folder validation endpoint

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use shared::DocType;

use crate::error::{AppError, AppResult};
use crate::services::classifier::{classify_folder, FolderValidation, MIN_CONFIDENCE};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidateFolderRequest {
    pub carpeta: String,
    #[serde(rename = "archivoID", default)]
    pub archivo_id: Option<String>,
    #[serde(rename = "usuarioID", default)]
    pub usuario_id: Option<String>,
    #[serde(default)]
    pub tipo_documento: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub min_confidence: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ValidateFolderResponse {
    #[serde(rename = "archivoID")]
    pub archivo_id: Option<String>,
    #[serde(rename = "usuarioID")]
    pub usuario_id: String,
    pub tipo_documento: DocType,
    pub proposed_folder: String,
    pub filename: String,
    pub route_validation: FolderValidation,
}

/// Decide whether a saved document belongs in the proposed folder. The
/// record is addressed by `archivoID` or by `usuarioID` + `tipo_documento`
/// (latest).
pub async fn validate_folder(
    State(state): State<AppState>,
    Json(body): Json<ValidateFolderRequest>,
) -> AppResult<Json<ValidateFolderResponse>> {
    if body.carpeta.is_empty() {
        return Err(AppError::validation(
            "'carpeta' is required",
            "Falta 'carpeta' en el body",
        ));
    }

    let record = if let Some(archivo_id) = &body.archivo_id {
        state
            .store
            .load(archivo_id)
            .await?
            .ok_or_else(|| AppError::NotFound("archivoID".into()))?
    } else if let (Some(usuario_id), Some(tipo)) = (&body.usuario_id, &body.tipo_documento) {
        let tipo = DocType::parse(tipo).ok_or_else(|| {
            AppError::validation(
                format!("invalid tipo_documento: {tipo}"),
                "tipo_documento inválido",
            )
        })?;
        state
            .store
            .load_latest_by_user(usuario_id, tipo)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("documents for that usuarioID and tipo_documento".into())
            })?
    } else {
        return Err(AppError::validation(
            "provide archivoID or usuarioID + tipo_documento",
            "Proporciona archivoID o (usuarioID + tipo_documento)",
        ));
    };

    let min_confidence = body.min_confidence.unwrap_or(MIN_CONFIDENCE);
    let result = classify_folder(
        &body.carpeta,
        body.filename.as_deref(),
        &record.raw_text,
        Some(record.tipo_documento),
        min_confidence,
    );

    Ok(Json(ValidateFolderResponse {
        archivo_id: record.archivo_id.clone(),
        usuario_id: record.usuario_id.clone(),
        tipo_documento: record.tipo_documento,
        proposed_folder: body.carpeta,
        filename: body.filename.unwrap_or_default(),
        route_validation: result,
    }))
}
