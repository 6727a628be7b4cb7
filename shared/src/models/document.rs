//! Extraction records and storage index models
//!
//! Wire names (`usuarioID`, `archivoID`, `tipo_documento`) are kept in the
//! Spanish form used by the wallet clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::export::OcrExport;
use crate::types::{CandidateSource, DocType};

/// A persisted extraction record, also the body of the extract response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRecord {
    #[serde(rename = "usuarioID")]
    pub usuario_id: String,
    pub tipo_documento: DocType,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_source: Option<String>,
    #[serde(default)]
    pub pages: Vec<PageMeta>,
    /// Assigned on first save
    #[serde(rename = "archivoID", default, skip_serializing_if = "Option::is_none")]
    pub archivo_id: Option<String>,
    /// Unix timestamp of the last save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageLocation>,
}

fn default_confidence() -> f64 {
    1.0
}

impl ExtractRecord {
    pub fn new(usuario_id: impl Into<String>, tipo_documento: DocType) -> Self {
        Self {
            usuario_id: usuario_id.into(),
            tipo_documento,
            raw_text: String::new(),
            fields: BTreeMap::new(),
            confidence: 1.0,
            export_source: None,
            pages: Vec::new(),
            archivo_id: None,
            ts: None,
            debug: None,
            storage: None,
        }
    }
}

/// Per-page metadata from the PDF pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMeta {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub dpi: Option<u32>,
    #[serde(default)]
    pub skew: f64,
}

/// Where a record lives in object storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageLocation {
    pub bucket: String,
    pub key: String,
    pub s3_uri: String,
    pub http_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presigned_url: Option<String>,
}

/// Per-user document index: document type -> saved entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIndex {
    #[serde(rename = "usuarioID")]
    pub usuario_id: String,
    #[serde(default)]
    pub docs: BTreeMap<String, Vec<UserDocEntry>>,
}

impl UserIndex {
    pub fn new(usuario_id: impl Into<String>) -> Self {
        Self {
            usuario_id: usuario_id.into(),
            docs: BTreeMap::new(),
        }
    }

    /// Record a saved document, replacing any previous entry with the same id.
    pub fn upsert(&mut self, tipo_documento: DocType, archivo_id: &str, ts: f64) {
        let entries = self
            .docs
            .entry(tipo_documento.as_str().to_string())
            .or_default();
        entries.retain(|e| e.archivo_id != archivo_id);
        entries.push(UserDocEntry {
            archivo_id: archivo_id.to_string(),
            ts,
        });
    }

    /// Most recently saved entry for a document type.
    pub fn latest(&self, tipo_documento: DocType) -> Option<&UserDocEntry> {
        self.docs
            .get(tipo_documento.as_str())?
            .iter()
            .max_by(|a, b| a.ts.total_cmp(&b.ts))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDocEntry {
    #[serde(rename = "archivoID")]
    pub archivo_id: String,
    pub ts: f64,
}

/// A field exposed through the component endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ComponentKey {
    pub key: &'static str,
    pub label: &'static str,
}

/// Fixed component key sets per document type
pub fn component_keys(tipo_documento: DocType) -> &'static [ComponentKey] {
    const INE: &[ComponentKey] = &[
        ComponentKey { key: "nombre", label: "Nombre" },
        ComponentKey { key: "sexo", label: "Sexo" },
        ComponentKey { key: "domicilio", label: "Domicilio" },
        ComponentKey { key: "clave_elector", label: "Clave de elector" },
        ComponentKey { key: "curp", label: "CURP" },
        ComponentKey { key: "anio_registro", label: "Año de registro" },
        ComponentKey { key: "fecha_nacimiento", label: "Fecha de nacimiento" },
        ComponentKey { key: "seccion", label: "Sección" },
        ComponentKey { key: "vigencia", label: "Vigencia" },
    ];
    const CURP: &[ComponentKey] = &[
        ComponentKey { key: "curp", label: "CURP" },
        ComponentKey { key: "nombre", label: "Nombre" },
        ComponentKey { key: "entidad_registro", label: "Entidad de registro" },
    ];
    const ACTA: &[ComponentKey] = &[
        ComponentKey { key: "curp", label: "Clave Única de Registro de Población" },
        ComponentKey { key: "entidad_registro", label: "Entidad de registro" },
        ComponentKey { key: "municipio_registro", label: "Municipio de registro" },
        ComponentKey { key: "nombres", label: "Nombre(s)" },
        ComponentKey { key: "primer_apellido", label: "Primer apellido" },
        ComponentKey { key: "segundo_apellido", label: "Segundo apellido" },
        ComponentKey { key: "sexo", label: "Sexo" },
        ComponentKey { key: "fecha_nacimiento", label: "Fecha de nacimiento" },
        ComponentKey { key: "lugar_nacimiento", label: "Lugar de nacimiento" },
    ];
    const OTROS: &[ComponentKey] = &[
        ComponentKey { key: "titulo", label: "Título" },
        ComponentKey { key: "fecha_documento", label: "Fecha del documento" },
        ComponentKey { key: "rfc_detectado", label: "RFC detectado" },
        ComponentKey { key: "curp_detectada", label: "CURP detectada" },
        ComponentKey { key: "folio", label: "Folio" },
        ComponentKey { key: "emisor", label: "Emisor" },
    ];
    match tipo_documento {
        DocType::Ine => INE,
        DocType::Curp => CURP,
        DocType::Acta => ACTA,
        DocType::Otros => OTROS,
    }
}

/// Per-field merge decision, surfaced in debug output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecision {
    pub field: String,
    pub chosen_from: CandidateSource,
    pub value: String,
}

/// Output of the OCR/PDF ingestion stage, before field extraction
#[derive(Debug, Clone)]
pub struct DocumentText {
    pub text: String,
    pub export: Option<OcrExport>,
    pub confidence: f64,
    pub source: String,
    pub pages_meta: Vec<PageMeta>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_index_upsert_replaces_duplicates() {
        let mut idx = UserIndex::new("u1");
        idx.upsert(DocType::Ine, "a", 1.0);
        idx.upsert(DocType::Ine, "b", 2.0);
        idx.upsert(DocType::Ine, "a", 3.0);
        assert_eq!(idx.docs["ine"].len(), 2);
        assert_eq!(idx.latest(DocType::Ine).unwrap().archivo_id, "a");
        assert!(idx.latest(DocType::Curp).is_none());
    }

    #[test]
    fn record_roundtrip_keeps_wire_names() {
        let mut rec = ExtractRecord::new("u1", DocType::Ine);
        rec.archivo_id = Some("ocr_1".into());
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["usuarioID"], "u1");
        assert_eq!(v["archivoID"], "ocr_1");
        assert_eq!(v["tipo_documento"], "ine");
        let back: ExtractRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back.usuario_id, "u1");
    }
}
