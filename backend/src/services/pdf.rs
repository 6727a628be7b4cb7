//! PDF ingestion
//!
//! A PDF is either digital (it carries a text layer) or scanned. Digital
//! PDFs take their raw text and confidence from the text layer, page by
//! page; the engine is still asked for the geometry export so template and
//! layout extraction keep working, and an engine failure degrades to
//! text-only extraction. Scanned PDFs go to the OCR engine outright, which
//! rasterizes and recognizes them.

use lopdf::Document;

use shared::{DocumentText, PageMeta};

use crate::error::{AppError, AppResult};
use crate::external::OcrEngineClient;

/// PDF detection by declared content type or magic bytes.
pub fn is_pdf(file_bytes: &[u8], content_type: Option<&str>) -> bool {
    if let Some(ct) = content_type {
        if ct.to_lowercase().contains("pdf") {
            return true;
        }
    }
    file_bytes.starts_with(b"%PDF-")
}

/// Confidence heuristic: word density per page, clamped to 0.6..1.0. A
/// dense page reads as a trustworthy recognition; an almost-empty one
/// stays at the floor.
pub fn confidence_from_density(total_words: usize, total_pages: usize) -> f64 {
    let pages = total_pages.max(1) as f64;
    let density = total_words as f64 / pages;
    (0.6 + density / 800.0).clamp(0.6, 1.0)
}

fn extract_text_layer(doc: &Document) -> Vec<String> {
    let mut pages_text = Vec::new();
    for page_number in doc.get_pages().keys() {
        let text = doc.extract_text(&[*page_number]).unwrap_or_default();
        pages_text.push(text.trim().to_string());
    }
    pages_text
}

/// Ingest a PDF into text, export, and page metadata.
pub async fn run_pdf_pipeline(
    file_bytes: Vec<u8>,
    ocr: &OcrEngineClient,
) -> AppResult<DocumentText> {
    let doc = Document::load_mem(&file_bytes)
        .map_err(|e| AppError::InvalidDocument(format!("cannot open PDF: {e}")))?;
    let page_count = doc.get_pages().len();
    if page_count == 0 {
        return Err(AppError::InvalidDocument("PDF has no pages".into()));
    }

    let pages_text = extract_text_layer(&doc);
    let is_digital = pages_text.iter().any(|t| !t.is_empty());

    if is_digital {
        let text = pages_text.join("\n\n");
        let total_words = text.split_whitespace().count();
        let pages_meta = (0..page_count)
            .map(|_| PageMeta {
                width: None,
                height: None,
                dpi: None,
                skew: 0.0,
            })
            .collect();
        tracing::info!(pages = page_count, words = total_words, "digital PDF text layer");
        let export = match ocr.recognize(file_bytes, Some("application/pdf")).await {
            Ok(export) => Some(export),
            Err(e) => {
                tracing::warn!("no geometry export for digital PDF: {e}");
                None
            }
        };
        return Ok(DocumentText {
            text,
            export,
            confidence: confidence_from_density(total_words, page_count),
            source: "pdf_text".to_string(),
            pages_meta,
        });
    }

    tracing::info!(pages = page_count, "scanned PDF, sending to OCR engine");
    let export = ocr.recognize(file_bytes, Some("application/pdf")).await?;
    let text = export.flatten_text();
    let total_words = export.word_count();
    let export_pages = export.pages.len().max(1);
    let pages_meta = (0..export.pages.len())
        .map(|_| PageMeta {
            width: None,
            height: None,
            dpi: Some(300),
            skew: 0.0,
        })
        .collect();
    Ok(DocumentText {
        text,
        export: Some(export),
        confidence: confidence_from_density(total_words, export_pages),
        source: "ocr_engine".to_string(),
        pages_meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    use crate::config::OcrConfig;

    fn digital_pdf_bytes(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    async fn spawn_stub_engine() -> String {
        use axum::{routing::post, Json, Router};
        let app = Router::new().route(
            "/ocr",
            post(|| async {
                Json(serde_json::json!({"export": {"pages": [{"blocks": [{"lines": [
                    {"words": [{"value": "HOLA", "geometry": [0.1, 0.1, 0.3, 0.15]}]},
                ]}]}]}}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn engine_client(engine_url: String, timeout_seconds: u64) -> OcrEngineClient {
        OcrEngineClient::new(&OcrConfig {
            engine_url,
            timeout_seconds,
            annotator_enabled: false,
            template_overrides: false,
            inline_debug: false,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn digital_pdf_keeps_text_layer_and_gets_geometry() {
        let ocr = engine_client(spawn_stub_engine().await, 5);
        let pdf = digital_pdf_bytes("ACTA DE NACIMIENTO");

        let out = run_pdf_pipeline(pdf, &ocr).await.unwrap();
        assert_eq!(out.source, "pdf_text");
        assert!(out.text.contains("ACTA DE NACIMIENTO"));
        let export = out.export.expect("geometry export from engine");
        assert_eq!(export.word_count(), 1);
    }

    #[tokio::test]
    async fn digital_pdf_survives_engine_outage_without_geometry() {
        let ocr = engine_client("http://127.0.0.1:9".to_string(), 1);
        let pdf = digital_pdf_bytes("CLAVE UNICA DE REGISTRO DE POBLACION");

        let out = run_pdf_pipeline(pdf, &ocr).await.unwrap();
        assert_eq!(out.source, "pdf_text");
        assert!(out.export.is_none());
        assert!(out.text.contains("REGISTRO DE POBLACION"));
    }

    #[test]
    fn pdf_detection_by_type_and_magic() {
        assert!(is_pdf(b"anything", Some("application/pdf")));
        assert!(is_pdf(b"anything", Some("Application/PDF; charset=x")));
        assert!(is_pdf(b"%PDF-1.7 rest", None));
        assert!(!is_pdf(b"\x89PNG", Some("image/png")));
    }

    #[test]
    fn density_confidence_clamps() {
        assert_eq!(confidence_from_density(0, 1), 0.6);
        assert_eq!(confidence_from_density(800, 2), 0.6 + 400.0 / 800.0);
        assert_eq!(confidence_from_density(10_000, 1), 1.0);
        // zero pages treated as one
        assert_eq!(confidence_from_density(0, 0), 0.6);
    }
}
