//! Template-box extraction
//!
//! Each known document layout carries a set of normalized boxes (x, y, w, h
//! in 0..1 page coordinates) naming where a field's value is printed. The
//! extractor keeps the OCR words whose centers fall inside a box, joins
//! them in reading order, and post-processes the result per document type.
//!
//! Box overrides can be loaded from and saved to a JSON file on disk when
//! enabled in configuration; production runs with the frozen built-ins.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use shared::{
    clave_elector_regex, curp_regex, date_regex, find_state, normalize, only_letters_spaces,
    seccion_regex, sexo_letter, vigencia_regex, year_regex, DocType, OcrExport,
};

use crate::error::{AppError, AppResult};
use crate::services::parsers::Fields;

/// A normalized field box: left, top, width, height in page fractions.
/// Serializes as `[x, y, w, h]`, the format used by the override file and
/// the tooling endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(into = "[f64; 4]", from = "[f64; 4]")]
pub struct TemplateBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl From<[f64; 4]> for TemplateBox {
    fn from([x, y, w, h]: [f64; 4]) -> Self {
        Self { x, y, w, h }
    }
}

impl From<TemplateBox> for [f64; 4] {
    fn from(b: TemplateBox) -> Self {
        [b.x, b.y, b.w, b.h]
    }
}

impl TemplateBox {
    const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    fn contains(&self, cx: f64, cy: f64) -> bool {
        cx >= self.x && cx <= self.x + self.w && cy >= self.y && cy <= self.y + self.h
    }
}

pub type TemplateBoxes = BTreeMap<String, TemplateBox>;

pub fn default_template(tipo: DocType) -> Option<&'static str> {
    match tipo {
        DocType::Acta => Some("acta_carta_portrait"),
        DocType::Curp => Some("curp_carta_landscape"),
        DocType::Ine => Some("ine_9x6_h"),
        DocType::Otros => None,
    }
}

fn base_templates() -> BTreeMap<String, TemplateBoxes> {
    let mut all = BTreeMap::new();

    let acta: &[(&str, TemplateBox)] = &[
        ("curp", TemplateBox::new(0.665, 0.112, 0.22, 0.016)),
        ("entidad_registro", TemplateBox::new(0.670, 0.194, 0.22, 0.016)),
        ("municipio_registro", TemplateBox::new(0.643, 0.232, 0.28, 0.016)),
        ("nombres", TemplateBox::new(0.119, 0.326, 0.20, 0.016)),
        ("primer_apellido", TemplateBox::new(0.420, 0.327, 0.20, 0.016)),
        ("segundo_apellido", TemplateBox::new(0.697, 0.327, 0.22, 0.016)),
        ("sexo", TemplateBox::new(0.142, 0.387, 0.13, 0.016)),
        ("fecha_nacimiento", TemplateBox::new(0.438, 0.375, 0.13, 0.028)),
        ("lugar_nacimiento", TemplateBox::new(0.680, 0.372, 0.25, 0.032)),
    ];

    let curp: &[(&str, TemplateBox)] = &[
        ("curp", TemplateBox::new(0.263, 0.174, 0.36, 0.025)),
        ("nombre", TemplateBox::new(0.251, 0.231, 0.55, 0.025)),
        ("entidad_registro", TemplateBox::new(0.459, 0.277, 0.15, 0.028)),
    ];

    let ine: &[(&str, TemplateBox)] = &[
        ("nombre", TemplateBox::new(0.327, 0.313, 0.35, 0.19)),
        ("sexo", TemplateBox::new(0.839, 0.253, 0.14, 0.075)),
        ("domicilio", TemplateBox::new(0.324, 0.555, 0.475, 0.14)),
        ("clave_elector", TemplateBox::new(0.499, 0.704, 0.30, 0.052)),
        ("curp", TemplateBox::new(0.324, 0.801, 0.31, 0.05)),
        ("anio_registro", TemplateBox::new(0.663, 0.801, 0.18, 0.05)),
        ("fecha_nacimiento", TemplateBox::new(0.319, 0.904, 0.16, 0.05)),
        ("seccion", TemplateBox::new(0.552, 0.906, 0.08, 0.05)),
        ("vigencia", TemplateBox::new(0.679, 0.905, 0.19, 0.05)),
    ];

    for (name, boxes) in [
        ("acta_carta_portrait", acta),
        ("curp_carta_landscape", curp),
        ("ine_9x6_h", ine),
    ] {
        all.insert(
            name.to_string(),
            boxes
                .iter()
                .map(|(k, b)| (k.to_string(), *b))
                .collect::<TemplateBoxes>(),
        );
    }
    all
}

/// Metadata returned alongside template extraction, surfaced in debug output.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateMeta {
    pub template_id: String,
    pub fields_total: usize,
    pub fields_with_text: usize,
}

/// In-memory template registry with optional on-disk overrides.
pub struct TemplateStore {
    allow_overrides: bool,
    override_path: PathBuf,
    templates: RwLock<BTreeMap<String, TemplateBoxes>>,
}

impl TemplateStore {
    pub fn new(allow_overrides: bool, local_root: &str) -> Self {
        let override_path = PathBuf::from(local_root)
            .join("ocr")
            .join("templates_override.json");
        let mut templates = base_templates();
        if allow_overrides {
            merge_overrides(&mut templates, &override_path);
        }
        Self {
            allow_overrides,
            override_path,
            templates: RwLock::new(templates),
        }
    }

    pub fn overrides_enabled(&self) -> bool {
        self.allow_overrides
    }

    pub fn all(&self) -> BTreeMap<String, TemplateBoxes> {
        self.templates
            .read()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    pub fn boxes(&self, template_id: &str) -> Option<TemplateBoxes> {
        self.templates
            .read()
            .ok()
            .and_then(|t| t.get(template_id).cloned())
    }

    /// Persist an override and reload the merged registry.
    pub fn save_override(&self, template_id: &str, boxes: TemplateBoxes) -> AppResult<()> {
        if !self.allow_overrides {
            return Err(AppError::Configuration(
                "template overrides are disabled".into(),
            ));
        }
        let mut overrides = read_override_file(&self.override_path);
        overrides.insert(template_id.to_string(), boxes);

        if let Some(parent) = self.override_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Storage(format!("create {}: {e}", parent.display())))?;
        }
        let json = serde_json::to_vec_pretty(&overrides)
            .map_err(|e| AppError::Internal(format!("serialize overrides: {e}")))?;
        std::fs::write(&self.override_path, json).map_err(|e| {
            AppError::Storage(format!("write {}: {e}", self.override_path.display()))
        })?;

        let mut merged = base_templates();
        merge_overrides(&mut merged, &self.override_path);
        if let Ok(mut t) = self.templates.write() {
            *t = merged;
        }
        tracing::info!(template_id, "template override saved");
        Ok(())
    }
}

fn read_override_file(path: &PathBuf) -> BTreeMap<String, TemplateBoxes> {
    let Ok(bytes) = std::fs::read(path) else {
        return BTreeMap::new();
    };
    serde_json::from_slice(&bytes).unwrap_or_default()
}

fn merge_overrides(templates: &mut BTreeMap<String, TemplateBoxes>, path: &PathBuf) {
    for (tpl_id, fields) in read_override_file(path) {
        let entry = templates.entry(tpl_id).or_default();
        for (k, v) in fields {
            entry.insert(k, v);
        }
    }
}

/// Extract fields by keeping the first-page words whose centers fall inside
/// each template box, joined top-to-bottom then left-to-right.
pub fn extract_by_template(
    tipo_documento: DocType,
    export: &OcrExport,
    template_id: Option<&str>,
    store: &TemplateStore,
) -> AppResult<(Fields, TemplateMeta)> {
    let tpl_name = template_id
        .map(str::to_string)
        .or_else(|| default_template(tipo_documento).map(str::to_string))
        .ok_or_else(|| {
            AppError::InvalidDocument("no template for this document type".into())
        })?;
    let boxes = store
        .boxes(&tpl_name)
        .ok_or_else(|| AppError::InvalidDocument(format!("unknown template: {tpl_name}")))?;

    // word text + center, first page only
    let mut words: Vec<(String, f64, f64)> = Vec::new();
    if let Some(page) = export.pages.first() {
        for block in &page.blocks {
            for line in &block.lines {
                for word in &line.words {
                    if word.value.is_empty() {
                        continue;
                    }
                    let bbox = shared::BBox::from_geometry(&word.geometry);
                    let (cx, cy) = bbox.center();
                    words.push((word.value.clone(), cx, cy));
                }
            }
        }
    }

    let mut fields = Fields::new();
    for (key, rel_box) in &boxes {
        let mut inside: Vec<&(String, f64, f64)> = words
            .iter()
            .filter(|(_, cx, cy)| rel_box.contains(*cx, *cy))
            .collect();
        inside.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.1.total_cmp(&b.1)));
        let joined = inside.iter().map(|(v, _, _)| v.as_str()).collect::<Vec<_>>();
        fields.insert(key.clone(), normalize(&joined.join(" ")));
    }

    if matches!(tipo_documento, DocType::Curp | DocType::Acta) {
        if let Some(v) = fields.get("curp") {
            if let Some(m) = curp_regex().find(v) {
                let narrowed = m.as_str().to_string();
                fields.insert("curp".into(), narrowed);
            }
        }
    }
    if tipo_documento == DocType::Ine {
        if let Some(v) = fields.get("clave_elector") {
            let squeezed: String = v.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
            fields.insert("clave_elector".into(), squeezed);
        }
    }

    let fields = post_process(tipo_documento, fields);
    let fields_with_text = fields.values().filter(|v| !v.is_empty()).count();
    let meta = TemplateMeta {
        template_id: tpl_name,
        fields_total: boxes.len(),
        fields_with_text,
    };
    Ok((fields, meta))
}

// ---------------------------------------------------------------------------
// Post-processing
// ---------------------------------------------------------------------------

fn label_prefixes(tipo: DocType, key: &str) -> &'static [&'static str] {
    match (tipo, key) {
        (DocType::Acta, "nombres") => &["NOMBRE", "NOMBRE S", "NOMBRES"],
        (DocType::Acta, "primer_apellido") => &["PRIMER APELLIDO", "APELLIDO PATERNO"],
        (DocType::Acta, "segundo_apellido") => &["SEGUNDO APELLIDO", "APELLIDO MATERNO"],
        (DocType::Acta, "entidad_registro") => &["ENTIDAD DE REGISTRO"],
        (DocType::Acta, "municipio_registro") => &["MUNICIPIO DE REGISTRO"],
        (DocType::Acta, "lugar_nacimiento") => &["LUGAR DE NACIMIENTO"],
        (DocType::Curp, "nombre") => &["NOMBRE", "NOMBRE S", "NOMBRES"],
        (DocType::Curp, "entidad_registro") => &["ENTIDAD DE REGISTRO", "LUGAR DE REGISTRO"],
        (DocType::Ine, "nombre") => &["NOMBRE"],
        (DocType::Ine, "domicilio") => &["DOMICILIO"],
        (DocType::Ine, "clave_elector") => &["CLAVE DE ELECTOR"],
        (DocType::Ine, "fecha_nacimiento") => &["FECHA DE NACIMIENTO", "FECHA DENACIMIENTO"],
        (DocType::Ine, "vigencia") => &["VIGENCIA"],
        (DocType::Ine, "seccion") => &["SECCION"],
        _ => &[],
    }
}

fn strip_any_prefix(s: &str, prefixes: &[&str]) -> String {
    let t = normalize(s);
    for p in prefixes {
        if let Some(rest) = t.strip_prefix(p) {
            return rest.trim().to_string();
        }
    }
    t
}

fn narrow(fields: &mut Fields, key: &str, re: &regex::Regex) {
    if let Some(v) = fields.get(key) {
        let narrowed = re.find(v).map(|m| m.as_str().to_string()).unwrap_or_default();
        fields.insert(key.to_string(), narrowed);
    }
}

/// Clean template values per document type: strip leaked label prefixes,
/// narrow pattern fields to their pattern, reduce names to letters.
pub fn post_process(tipo_documento: DocType, fields: Fields) -> Fields {
    let mut out = fields;

    match tipo_documento {
        DocType::Ine => {
            for k in [
                "nombre",
                "domicilio",
                "clave_elector",
                "fecha_nacimiento",
                "vigencia",
                "seccion",
            ] {
                if let Some(v) = out.get(k) {
                    if !v.is_empty() {
                        let stripped = strip_any_prefix(v, label_prefixes(DocType::Ine, k));
                        out.insert(k.to_string(), stripped);
                    }
                }
            }
            if let Some(v) = out.get("sexo") {
                let letter = sexo_letter(v).unwrap_or("").to_string();
                out.insert("sexo".into(), letter);
            }
            narrow(&mut out, "anio_registro", year_regex());
            narrow(&mut out, "seccion", seccion_regex());
            narrow(&mut out, "vigencia", vigencia_regex());
            narrow(&mut out, "fecha_nacimiento", date_regex());
            if let Some(v) = out.get("clave_elector") {
                let cand = clave_elector_regex()
                    .find(v)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| v.chars().filter(|c| c.is_ascii_alphanumeric()).collect());
                out.insert("clave_elector".into(), cand);
            }
            narrow(&mut out, "curp", curp_regex());
            if let Some(v) = out.get("domicilio") {
                let cleaned = v
                    .trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
                    .trim()
                    .to_string();
                out.insert("domicilio".into(), cleaned);
            }
        }

        DocType::Curp => {
            narrow(&mut out, "curp", curp_regex());
            if let Some(v) = out.get("nombre") {
                let stripped = strip_any_prefix(v, label_prefixes(DocType::Curp, "nombre"));
                out.insert("nombre".into(), only_letters_spaces(&stripped));
            }
            if let Some(v) = out.get("entidad_registro") {
                let stripped =
                    strip_any_prefix(v, label_prefixes(DocType::Curp, "entidad_registro"));
                let resolved =
                    find_state(&stripped).unwrap_or_else(|| only_letters_spaces(&stripped));
                out.insert("entidad_registro".into(), resolved);
            }
        }

        DocType::Acta => {
            narrow(&mut out, "curp", curp_regex());
            for k in [
                "nombres",
                "primer_apellido",
                "segundo_apellido",
                "entidad_registro",
                "municipio_registro",
                "sexo",
                "fecha_nacimiento",
                "lugar_nacimiento",
            ] {
                if let Some(v) = out.get(k) {
                    if !v.is_empty() {
                        let stripped = strip_any_prefix(v, label_prefixes(DocType::Acta, k));
                        out.insert(k.to_string(), stripped);
                    }
                }
            }
            for k in [
                "nombres",
                "primer_apellido",
                "segundo_apellido",
                "lugar_nacimiento",
                "municipio_registro",
            ] {
                if let Some(v) = out.get(k) {
                    let letters = only_letters_spaces(v);
                    out.insert(k.to_string(), letters);
                }
            }
            if let Some(v) = out.get("sexo") {
                let letter = sexo_letter(v).unwrap_or("").to_string();
                out.insert("sexo".into(), letter);
            }
            narrow(&mut out, "fecha_nacimiento", date_regex());
            if let Some(v) = out.get("entidad_registro") {
                if let Some(st) = find_state(v) {
                    out.insert("entidad_registro".into(), st);
                }
            }
        }

        DocType::Otros => {}
    }

    out
}
