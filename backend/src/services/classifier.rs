//! Folder classification
//!
//! Decides whether a document belongs in the expedient folder the client
//! proposes. Every folder maps to the document kinds it accepts, each kind
//! to the phrases that identify it; candidates are fuzzy-matched against
//! the filename and the OCR text, with a small bonus when the detected
//! document type agrees with the candidate.

use serde::Serialize;
use strsim::{normalized_levenshtein, sorensen_dice};

use shared::DocType;

/// Folder to accepted document kinds. Matching is accent-folded so the
/// display names can keep their Spanish spelling.
const FOLDER_RULES: &[(&str, &[&str])] = &[
    ("Identificación oficial", &["INE"]),
    ("CURP", &["CURP"]),
    ("Acta de nacimiento", &["Acta de nacimiento"]),
    (
        "Comprobante de domicilio",
        &["Recibo de luz (CFE)", "Recibo de teléfono fijo"],
    ),
];

fn aliases(doc: &str) -> &'static [&'static str] {
    match doc {
        "INE" => &[
            "CREDENCIAL PARA VOTAR",
            "INSTITUTO NACIONAL ELECTORAL",
            "CREDENCIAL DE ELECTOR",
        ],
        "CURP" => &["CLAVE UNICA DE REGISTRO DE POBLACION"],
        "Acta de nacimiento" => &["ACTA DE NACIMIENTO"],
        "Recibo de luz (CFE)" => &["RECIBO DE LUZ", "CFE"],
        "Recibo de teléfono fijo" => &["RECIBO DE TELEFONO"],
        _ => &[],
    }
}

fn canonical_doc(tipo: DocType) -> Option<&'static str> {
    match tipo {
        DocType::Ine => Some("INE"),
        DocType::Curp => Some("CURP"),
        DocType::Acta => Some("Acta de nacimiento"),
        DocType::Otros => None,
    }
}

/// Accent-fold, uppercase, and treat separators as spaces.
fn norm(s: &str) -> String {
    let folded = deunicode::deunicode(s).to_uppercase();
    let spaced = folded.replace(['_', '-'], " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Best alignment of `needle` inside `haystack`: exact substring scores 1,
/// otherwise the best token-window similarity.
fn partial_score(needle: &str, haystack: &str) -> f64 {
    if needle.is_empty() || haystack.is_empty() {
        return 0.0;
    }
    if haystack.contains(needle) {
        return 1.0;
    }
    let n_tokens: Vec<&str> = needle.split(' ').collect();
    let h_tokens: Vec<&str> = haystack.split(' ').collect();
    let width = n_tokens.len().min(h_tokens.len());
    if width == 0 {
        return 0.0;
    }
    let mut best = 0.0_f64;
    for window in h_tokens.windows(width) {
        let candidate = window.join(" ");
        best = best.max(normalized_levenshtein(needle, &candidate));
    }
    best
}

/// Order-insensitive token similarity, forgiving of extra words.
fn token_score(needle: &str, haystack: &str) -> f64 {
    if needle.is_empty() || haystack.is_empty() {
        return 0.0;
    }
    let mut n: Vec<&str> = needle.split(' ').collect();
    let mut h: Vec<&str> = haystack.split(' ').collect();
    n.sort_unstable();
    n.dedup();
    h.sort_unstable();
    h.dedup();
    h.retain(|t| n.contains(t) || n.iter().any(|x| normalized_levenshtein(x, t) > 0.8));
    sorensen_dice(&n.join(" "), &h.join(" "))
}

fn score_candidate(candidate: &str, name: &str, text: &str) -> f64 {
    let c = norm(candidate);
    if c.is_empty() {
        return 0.0;
    }
    partial_score(&c, name)
        .max(partial_score(&c, text))
        .max(token_score(&c, text))
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderCandidate {
    pub folder: String,
    pub doc: String,
    pub phrase: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderValidation {
    pub status: String,
    pub ok: bool,
    pub confidence: f64,
    pub predicted_folder: String,
    pub predicted_doc: String,
    pub matched_phrase: String,
    pub proposed_folder: String,
    pub message: String,
    pub top_candidates: Vec<FolderCandidate>,
}

pub const MIN_CONFIDENCE: f64 = 0.65;

/// Classify a document against a proposed folder.
pub fn classify_folder(
    proposed_folder: &str,
    filename: Option<&str>,
    raw_text: &str,
    tipo_documento: Option<DocType>,
    min_confidence: f64,
) -> FolderValidation {
    let name = norm(filename.unwrap_or(""));
    let text = norm(raw_text);
    let preferred = tipo_documento.and_then(canonical_doc);

    let mut scored: Vec<(f64, &str, &str, &str)> = Vec::new();
    for (folder, docs) in FOLDER_RULES {
        for doc in *docs {
            let phrases = std::iter::once(*doc).chain(aliases(doc).iter().copied());
            for phrase in phrases {
                let mut sc = score_candidate(phrase, &name, &text);
                if preferred == Some(*doc) {
                    sc = (sc + 0.10).min(1.0);
                }
                scored.push((sc, folder, doc, phrase));
            }
        }
    }
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let (score, predicted_folder, predicted_doc, matched_phrase) = scored
        .first()
        .map(|(sc, f, d, p)| (*sc, f.to_string(), d.to_string(), p.to_string()))
        .unwrap_or((0.0, String::new(), String::new(), String::new()));

    let mut ok = false;
    let mut status = "inconclusive".to_string();
    let mut message = "No hay suficiente confianza para clasificar.".to_string();

    if score >= min_confidence && !predicted_folder.is_empty() {
        if !proposed_folder.is_empty() && norm(&predicted_folder) == norm(proposed_folder) {
            ok = true;
            status = "true".to_string();
            message = format!("El documento pertenece a la carpeta '{predicted_folder}'.");
        } else {
            status = "Sin Coincidencia".to_string();
            message = format!(
                "El documento NO pertenece a '{proposed_folder}'. \
                 Sugerido: '{predicted_folder}' (coincide con '{predicted_doc}')."
            );
        }
    }

    let top_candidates = scored
        .iter()
        .take(3)
        .map(|(sc, f, d, p)| FolderCandidate {
            folder: f.to_string(),
            doc: d.to_string(),
            phrase: p.to_string(),
            score: round4(*sc),
        })
        .collect();

    FolderValidation {
        status,
        ok,
        confidence: round4(score),
        predicted_folder,
        predicted_doc,
        matched_phrase,
        proposed_folder: proposed_folder.to_string(),
        message,
        top_candidates,
    }
}
