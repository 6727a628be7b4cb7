//! OCR Wallet Extractor - Backend Server
//!
//! Extracts structured fields from Mexican identity documents (INE, CURP,
//! acta de nacimiento, and free-form documents), scores image quality,
//! and validates expedient folder placement.

use std::{net::SocketAddr, sync::Arc};

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod external;
mod handlers;
mod routes;
mod services;
mod storage;

pub use config::Config;

use config::StorageBackend;
use external::OcrEngineClient;
use services::TemplateStore;
use storage::{DocumentStore, LocalStore, S3Store};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    pub ocr: OcrEngineClient,
    pub templates: Arc<TemplateStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ocr_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting OCR Wallet Extractor Server");
    tracing::info!("Environment: {}", config.environment);

    // Document record store
    let store: Arc<dyn DocumentStore> = match config.storage.backend {
        StorageBackend::Local => {
            tracing::info!(root = %config.storage.local_root, "using local storage");
            Arc::new(LocalStore::new(&config.storage.local_root))
        }
        StorageBackend::S3 => {
            tracing::info!(bucket = %config.storage.s3.bucket, "using S3 storage");
            Arc::new(S3Store::new(&config.storage.s3).await?)
        }
    };

    let ocr = OcrEngineClient::new(&config.ocr)?;
    let templates = Arc::new(TemplateStore::new(
        config.ocr.template_overrides,
        &config.storage.local_root,
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        ocr,
        templates,
    };

    // Build application
    let app = create_app(state);

    // Start server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes and middleware
fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .nest("/ocr", routes::ocr_routes());

    if state.config.ocr.annotator_enabled {
        tracing::info!("template annotator tooling enabled");
        app = app.nest("/ocr-tools", routes::tooling_routes());
    }

    let body_limit = state.config.server.max_upload_mb * 1024 * 1024;

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::{OcrConfig, S3Config, ServerConfig, StorageConfig};

    fn test_state(root: &std::path::Path) -> AppState {
        let config = Config {
            environment: "test".to_string(),
            server: ServerConfig::default(),
            storage: StorageConfig {
                backend: StorageBackend::Local,
                local_root: root.display().to_string(),
                s3: S3Config {
                    bucket: String::new(),
                    region: "us-east-1".to_string(),
                    prefix: "ocr".to_string(),
                    public_url_base: String::new(),
                },
            },
            ocr: OcrConfig {
                engine_url: "http://127.0.0.1:9".to_string(),
                timeout_seconds: 1,
                annotator_enabled: false,
                template_overrides: false,
                inline_debug: false,
            },
        };
        let ocr = OcrEngineClient::new(&config.ocr).unwrap();
        let templates = Arc::new(TemplateStore::new(false, &config.storage.local_root));
        AppState {
            config: Arc::new(config),
            store: Arc::new(LocalStore::new(root)),
            ocr,
            templates,
        }
    }

    fn multipart_file_body(boundary: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\n\
                 Content-Disposition: form-data; name=\"file\"; filename=\"foto.jpg\"\r\n\
                 Content-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }

    #[tokio::test]
    async fn uploads_above_two_megabytes_reach_the_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(test_state(dir.path()));

        // 3 MB of junk: over axum's stock limit, under ours. It must get
        // far enough to fail image decoding, not die in the multipart
        // reader.
        let boundary = "test-boundary";
        let body = multipart_file_body(boundary, &vec![0xABu8; 3 * 1024 * 1024]);
        let request = Request::builder()
            .method("POST")
            .uri("/ocr/quality")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["code"], "INVALID_DOCUMENT");
    }
}
