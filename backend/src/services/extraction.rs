//! Extraction orchestration
//!
//! Ties the whole pipeline together: content rules per document type,
//! OCR or PDF ingestion, the three field candidates, the merge, and
//! persistence of the resulting record.

use std::sync::Arc;

use serde_json::json;

use shared::{DocType, DocumentText, ExtractRecord};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::external::OcrEngineClient;
use crate::services::merge::smart_merge_fields;
use crate::services::parsers::{detect_type, extract_fields, extract_fields_text_only, Fields};
use crate::services::pdf::{is_pdf, run_pdf_pipeline};
use crate::services::quality::assess_quality_value;
use crate::services::template::{default_template, extract_by_template, TemplateStore};
use crate::storage::DocumentStore;

/// INE card aspect: 8.56 cm by 5.40 cm, 8% tolerance, either orientation.
const INE_ASPECT: f64 = 8.56 / 5.40;
const INE_ASPECT_TOL: f64 = 0.08;

pub struct ExtractRequest {
    pub usuario_id: String,
    /// `None` means auto-detect from the recognized text
    pub tipo_documento: Option<DocType>,
    pub file_bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub debug: bool,
}

pub struct ExtractionService {
    config: Arc<Config>,
    ocr: OcrEngineClient,
    store: Arc<dyn DocumentStore>,
    templates: Arc<TemplateStore>,
}

fn is_image(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_lowercase().starts_with("image/"))
        .unwrap_or(false)
}

fn validate_ine_image(file_bytes: &[u8]) -> AppResult<()> {
    let img = image::load_from_memory(file_bytes)
        .map_err(|_| AppError::InvalidDocument("INE image cannot be decoded".into()))?;
    let (w, h) = (img.width() as f64, img.height() as f64);
    if w == 0.0 || h == 0.0 {
        return Err(AppError::InvalidDocument("INE image has no dimensions".into()));
    }
    let aspect = w / h;
    let in_range = |a: f64| {
        a >= INE_ASPECT * (1.0 - INE_ASPECT_TOL) && a <= INE_ASPECT * (1.0 + INE_ASPECT_TOL)
    };
    if !in_range(aspect) && !in_range(1.0 / aspect) {
        return Err(AppError::unsupported(
            "INE aspect ratio does not match a voter card (8.56x5.40 cm)",
            "INE inválida: razón de aspecto no coincide con credencial (8.56x5.40 cm)",
        ));
    }
    Ok(())
}

/// Per-type content rules: CURP and acta certificates arrive as PDF, the
/// INE as a card photo.
fn enforce_content_rules(
    tipo_documento: DocType,
    content_type: Option<&str>,
    file_bytes: &[u8],
) -> AppResult<()> {
    match tipo_documento {
        DocType::Curp | DocType::Acta => {
            if !is_pdf(file_bytes, content_type) {
                return Err(AppError::unsupported(
                    format!("{} must be a PDF", tipo_documento.as_str().to_uppercase()),
                    format!("{} debe ser PDF", tipo_documento.as_str().to_uppercase()),
                ));
            }
            Ok(())
        }
        DocType::Ine => {
            if !is_image(content_type) {
                return Err(AppError::unsupported(
                    "INE must be an image, not a PDF",
                    "INE debe ser imagen (no PDF)",
                ));
            }
            if file_bytes.is_empty() {
                return Err(AppError::validation("empty image", "Imagen vacía"));
            }
            validate_ine_image(file_bytes)
        }
        DocType::Otros => Ok(()),
    }
}

impl ExtractionService {
    pub fn new(
        config: Arc<Config>,
        ocr: OcrEngineClient,
        store: Arc<dyn DocumentStore>,
        templates: Arc<TemplateStore>,
    ) -> Self {
        Self {
            config,
            ocr,
            store,
            templates,
        }
    }

    async fn ingest(
        &self,
        file_bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> AppResult<DocumentText> {
        if is_pdf(&file_bytes, content_type) {
            return run_pdf_pipeline(file_bytes, &self.ocr).await;
        }
        let export = self
            .ocr
            .recognize(file_bytes, content_type.or(Some("application/octet-stream")))
            .await?;
        Ok(DocumentText {
            text: export.flatten_text(),
            export: Some(export),
            confidence: 1.0,
            source: "ocr_engine".to_string(),
            pages_meta: Vec::new(),
        })
    }

    /// Run the full extraction pipeline and persist the record.
    pub async fn extract(&self, req: ExtractRequest) -> AppResult<ExtractRecord> {
        if req.file_bytes.is_empty() {
            return Err(AppError::validation("empty file", "Archivo vacío"));
        }
        if req.usuario_id.is_empty() {
            return Err(AppError::validation("usuarioID is required", "Falta usuarioID"));
        }

        let content_type = req.content_type.as_deref();
        if let Some(forced) = req.tipo_documento {
            enforce_content_rules(forced, content_type, &req.file_bytes)?;
        }

        let ingested = self.ingest(req.file_bytes.clone(), content_type).await?;
        let detected_type = match req.tipo_documento {
            Some(t) => t,
            None => {
                let detected = detect_type(&ingested.text).ok_or_else(|| {
                    AppError::validation(
                        "document type could not be detected; send tipo_documento",
                        "No se pudo detectar el tipo de documento; envía tipo_documento",
                    )
                })?;
                enforce_content_rules(detected, content_type, &req.file_bytes)?;
                detected
            }
        };
        tracing::info!(
            usuario_id = %req.usuario_id,
            tipo = %detected_type,
            source = %ingested.source,
            "document ingested"
        );

        // Template extraction needs word geometry; failures degrade to an
        // empty candidate instead of failing the request.
        let mut fields_tpl = Fields::new();
        let mut template_debug = json!(null);
        if default_template(detected_type).is_some() {
            if let Some(export) = &ingested.export {
                match extract_by_template(detected_type, export, None, &self.templates) {
                    Ok((fields, meta)) => {
                        fields_tpl = fields;
                        template_debug = serde_json::to_value(meta).unwrap_or(json!(null));
                    }
                    Err(e) => {
                        tracing::warn!("template extraction failed: {e}");
                        template_debug = json!({"error": e.to_string()});
                    }
                }
            }
        }

        let fields_auto = extract_fields(detected_type, &ingested.text, ingested.export.as_ref());
        let fields_text = extract_fields_text_only(detected_type, &ingested.text);

        let (fields, decisions) =
            smart_merge_fields(detected_type, &fields_tpl, &fields_auto, &fields_text);

        let mut record = ExtractRecord::new(req.usuario_id, detected_type);
        record.raw_text = ingested.text;
        record.fields = fields;
        record.confidence = ingested.confidence;
        record.export_source = Some(ingested.source);
        record.pages = ingested.pages_meta;

        if req.debug || self.config.ocr.inline_debug {
            let mut debug = json!({
                "detected_type": detected_type,
                "template": template_debug,
                "candidates": {
                    "template": fields_tpl,
                    "auto": fields_auto,
                    "text": fields_text,
                },
                "decisions": decisions,
            });
            if is_image(content_type) {
                debug["quality"] = assess_quality_value(&req.file_bytes, content_type);
            }
            record.debug = Some(debug);
        }

        let archivo_id = self.store.save(&mut record).await?;
        record.storage = self.store.doc_location(&archivo_id).await;
        if let Some(loc) = &record.storage {
            tracing::info!(archivo_id = %archivo_id, uri = %loc.s3_uri, "record stored");
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn png_with_size(w: u32, h: u32) -> Vec<u8> {
        let img = GrayImage::from_pixel(w, h, Luma([128u8]));
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn curp_requires_pdf() {
        let err =
            enforce_content_rules(DocType::Curp, Some("image/png"), b"\x89PNG").unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMedia { .. }));
        assert!(enforce_content_rules(DocType::Curp, None, b"%PDF-1.4").is_ok());
    }

    #[test]
    fn ine_rejects_pdf_and_bad_aspect() {
        let err = enforce_content_rules(
            DocType::Ine,
            Some("application/pdf"),
            b"%PDF-1.4",
        )
        .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMedia { .. }));

        // square image, nowhere near card aspect
        let square = png_with_size(500, 500);
        let err = enforce_content_rules(DocType::Ine, Some("image/png"), &square).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMedia { .. }));
    }

    #[test]
    fn ine_accepts_card_aspect_in_both_orientations() {
        let landscape = png_with_size(856, 540);
        assert!(enforce_content_rules(DocType::Ine, Some("image/jpeg"), &landscape).is_ok());
        let portrait = png_with_size(540, 856);
        assert!(enforce_content_rules(DocType::Ine, Some("image/jpeg"), &portrait).is_ok());
    }

    #[test]
    fn ine_rejects_undecodable_image() {
        let err =
            enforce_content_rules(DocType::Ine, Some("image/png"), b"not a png").unwrap_err();
        assert!(matches!(err, AppError::InvalidDocument(_)));
    }

    #[test]
    fn otros_accepts_anything() {
        assert!(enforce_content_rules(DocType::Otros, Some("text/plain"), b"hola").is_ok());
    }
}
