//! Template tooling endpoints
//!
//! Mounted only when the annotator tooling is enabled in configuration.
//! Box overrides additionally require the override flag; production runs
//! with the built-in templates frozen.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::services::template::{TemplateBox, TemplateBoxes};
use crate::AppState;

/// GET /ocr-tools/templates
pub async fn list_templates(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.templates.all()))
}

#[derive(Debug, Deserialize)]
pub struct SaveTemplateBody {
    pub boxes: BTreeMap<String, [f64; 4]>,
}

/// POST /ocr-tools/templates/:template_id
pub async fn save_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    Json(body): Json<SaveTemplateBody>,
) -> AppResult<Json<Value>> {
    if body.boxes.is_empty() {
        return Err(AppError::validation(
            "body must be { \"boxes\": { key: [x, y, w, h], ... } }",
            "Body debe ser { 'boxes': {key: [x,y,w,h], ...} }",
        ));
    }
    let boxes: TemplateBoxes = body
        .boxes
        .into_iter()
        .map(|(k, v)| (k, TemplateBox::from(v)))
        .collect();
    let count = boxes.len();
    state.templates.save_override(&template_id, boxes)?;
    Ok(Json(json!({
        "status": "ok",
        "template_id": template_id,
        "count": count,
    })))
}
