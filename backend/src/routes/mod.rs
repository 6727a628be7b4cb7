//! Route definitions for the OCR Wallet Extractor

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Document extraction and lookup routes
pub fn ocr_routes() -> Router<AppState> {
    Router::new()
        .route("/extract", post(handlers::extract))
        .route(
            "/components/:tipo_documento/:archivo_id",
            get(handlers::components_get_by_doc).post(handlers::components_patch_by_doc),
        )
        .route(
            "/components/:tipo_documento/user/:usuario_id",
            get(handlers::components_get_by_user).post(handlers::components_patch_by_user),
        )
        .route("/quality", post(handlers::quality))
        .route("/validate-folder", post(handlers::validate_folder))
}

/// Template annotator tooling, mounted only when enabled
pub fn tooling_routes() -> Router<AppState> {
    Router::new()
        .route("/templates", get(handlers::list_templates))
        .route("/templates/:template_id", post(handlers::save_template))
}
