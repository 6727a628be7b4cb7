//! OCR Engine Client
//!
//! Client for the external OCR engine microservice. The engine accepts a
//! raw document upload and returns a page/block/line/word export with
//! normalized geometry.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use shared::OcrExport;

use crate::config::OcrConfig;
use crate::error::{AppError, AppResult};

/// Client for the OCR engine microservice
#[derive(Clone)]
pub struct OcrEngineClient {
    base_url: String,
    http_client: Client,
}

/// Response from the OCR engine
#[derive(Debug, Deserialize)]
pub struct RecognizeResponse {
    pub export: OcrExport,
}

impl OcrEngineClient {
    pub fn new(config: &OcrConfig) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            base_url: config.engine_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Run OCR on a document (image or PDF) and return the layout export.
    pub async fn recognize(
        &self,
        file_bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> AppResult<OcrExport> {
        let url = format!("{}/ocr", self.base_url);
        tracing::debug!(url = %url, bytes = file_bytes.len(), "calling OCR engine");

        let response = self
            .http_client
            .post(&url)
            .header(
                "content-type",
                content_type.unwrap_or("application/octet-stream"),
            )
            .body(file_bytes)
            .send()
            .await
            .map_err(|e| AppError::OcrEngine(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "OCR engine returned error");
            return Err(AppError::OcrEngine(format!(
                "engine returned {status}: {body}"
            )));
        }

        let parsed: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| AppError::OcrEngine(format!("invalid engine response: {e}")))?;

        tracing::debug!(
            pages = parsed.export.pages.len(),
            words = parsed.export.word_count(),
            "OCR engine export received"
        );
        Ok(parsed.export)
    }
}
