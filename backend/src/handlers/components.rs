//! Component endpoints
//!
//! Expose the extracted fields of a saved record as labeled components,
//! addressed either by `archivoID` or by the latest record of a type for
//! a user. POST variants patch field values in place.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use shared::{component_keys, ComponentKey, DocType, ExtractRecord};

use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ComponentsResponse {
    pub tipo_documento: DocType,
    #[serde(rename = "archivoID")]
    pub archivo_id: Option<String>,
    #[serde(rename = "usuarioID")]
    pub usuario_id: String,
    pub component_keys: &'static [ComponentKey],
    pub data: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct PatchBody {
    #[serde(default)]
    pub patch: BTreeMap<String, String>,
}

fn parse_tipo(tipo_documento: &str) -> AppResult<DocType> {
    DocType::parse(tipo_documento).ok_or_else(|| {
        AppError::validation(
            format!("invalid tipo_documento: {tipo_documento}"),
            "tipo_documento inválido",
        )
    })
}

fn components_of(tipo_documento: DocType, record: &ExtractRecord) -> ComponentsResponse {
    let keys = component_keys(tipo_documento);
    let data = keys
        .iter()
        .map(|k| (k.key.to_string(), record.fields.get(k.key).cloned()))
        .collect();
    ComponentsResponse {
        tipo_documento,
        archivo_id: record.archivo_id.clone(),
        usuario_id: record.usuario_id.clone(),
        component_keys: keys,
        data,
    }
}

/// GET /ocr/components/:tipo_documento/:archivoID
pub async fn components_get_by_doc(
    State(state): State<AppState>,
    Path((tipo_documento, archivo_id)): Path<(String, String)>,
) -> AppResult<Json<ComponentsResponse>> {
    let tipo = parse_tipo(&tipo_documento)?;
    let record = state
        .store
        .load(&archivo_id)
        .await?
        .ok_or_else(|| AppError::NotFound("archivoID".into()))?;
    Ok(Json(components_of(tipo, &record)))
}

/// GET /ocr/components/:tipo_documento/user/:usuarioID
pub async fn components_get_by_user(
    State(state): State<AppState>,
    Path((tipo_documento, usuario_id)): Path<(String, String)>,
) -> AppResult<Json<ComponentsResponse>> {
    let tipo = parse_tipo(&tipo_documento)?;
    let record = state
        .store
        .load_latest_by_user(&usuario_id, tipo)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("documents for that usuarioID and tipo_documento".into())
        })?;
    Ok(Json(components_of(tipo, &record)))
}

async fn apply_patch(
    state: &AppState,
    tipo: DocType,
    mut record: ExtractRecord,
    body: PatchBody,
) -> AppResult<Json<ComponentsResponse>> {
    record.fields.extend(body.patch);
    state.store.save(&mut record).await?;
    Ok(Json(components_of(tipo, &record)))
}

/// POST /ocr/components/:tipo_documento/:archivoID
pub async fn components_patch_by_doc(
    State(state): State<AppState>,
    Path((tipo_documento, archivo_id)): Path<(String, String)>,
    Json(body): Json<PatchBody>,
) -> AppResult<Json<ComponentsResponse>> {
    let tipo = parse_tipo(&tipo_documento)?;
    let record = state
        .store
        .load(&archivo_id)
        .await?
        .ok_or_else(|| AppError::NotFound("archivoID".into()))?;
    apply_patch(&state, tipo, record, body).await
}

/// POST /ocr/components/:tipo_documento/user/:usuarioID
pub async fn components_patch_by_user(
    State(state): State<AppState>,
    Path((tipo_documento, usuario_id)): Path<(String, String)>,
    Json(body): Json<PatchBody>,
) -> AppResult<Json<ComponentsResponse>> {
    let tipo = parse_tipo(&tipo_documento)?;
    let record = state
        .store
        .load_latest_by_user(&usuario_id, tipo)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("documents for that usuarioID and tipo_documento".into())
        })?;
    apply_patch(&state, tipo, record, body).await
}
