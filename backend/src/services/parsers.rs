//! Field extraction for Mexican identity documents
//!
//! Two independent candidate extractors live here:
//!
//! - `extract_fields` anchors on label token sequences in the OCR layout
//!   (lines rebuilt from export geometry) and collects values to the right
//!   of the label or in the lines below it.
//! - `extract_fields_text_only` works on plain text with preserved line
//!   breaks, using anchored regexes and line-walking heuristics. It is the
//!   only candidate available for digital PDFs without geometry.
//!
//! Label spellings include OCR-mangled variants seen in production
//! ("ANODEREGISTRO", "FECHA DENACIMIENTO").

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use shared::{
    clave_elector_regex, curp_regex, date_regex, find_curp, find_date, find_rfc, find_state,
    normalize, normalize_keep_lines, only_letters_spaces, seccion_regex, sexo_letter, sexo_regex,
    vigencia_regex, year_regex, DocType, OcrExport,
};

use crate::services::layout::{
    build_lines, collect_below_until_next_label, collect_right_same_line, find_label, first_tokens,
    LabelAliases, Line,
};

pub type Fields = BTreeMap<String, String>;

macro_rules! cached_regex {
    ($fn_name:ident, $pattern:expr) => {
        fn $fn_name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("valid pattern"))
        }
    };
}

/// Detect the document type from raw text. `None` means undetectable.
pub fn detect_type(text: &str) -> Option<DocType> {
    let t = normalize(text);
    cached_regex!(acta_re, r"\bACTA DE NACIMIENTO\b|\bOFICIAL DEL REGISTRO\b");
    cached_regex!(ine_re, r"\bINSTITUTO NACIONAL ELECTORAL\b|\bCREDENCIAL PARA VOTAR\b");
    cached_regex!(curp_doc_re, r"\bCLAVE UNICA DE REGISTRO DE POBLACION\b|\bCURP\b");

    if acta_re().is_match(&t) {
        return Some(DocType::Acta);
    }
    if ine_re().is_match(&t) {
        return Some(DocType::Ine);
    }
    if curp_doc_re().is_match(&t) {
        return Some(DocType::Curp);
    }
    None
}

// ---------------------------------------------------------------------------
// Label tables (normalized token sequences)
// ---------------------------------------------------------------------------

pub const INE_LABELS: &[(&str, LabelAliases)] = &[
    ("nombre", &[&["NOMBRE"]]),
    ("sexo", &[&["SEXO"]]),
    ("domicilio", &[&["DOMICILIO"]]),
    ("clave_elector", &[&["CLAVE", "DE", "ELECTOR"]]),
    ("curp", &[&["CURP"]]),
    (
        "anio_registro",
        &[
            &["ANO", "DE", "REGISTRO"],
            &["ANIO", "DE", "REGISTRO"],
            &["ANODEREGISTRO"],
            &["ANOI", "DE", "REGISTRO"],
        ],
    ),
    (
        "fecha_nacimiento",
        &[&["FECHA", "DE", "NACIMIENTO"], &["FECHA", "DENACIMIENTO"]],
    ),
    ("seccion", &[&["SECCION"]]),
    ("vigencia", &[&["VIGENCIA"]]),
];

pub const CURP_LABELS: &[(&str, LabelAliases)] = &[
    (
        "curp",
        &[
            &["CURP"],
            &["CLAVE", "UNICA", "DE", "REGISTRO", "DE", "POBLACION"],
        ],
    ),
    ("nombre", &[&["NOMBRE"], &["NOMBRES"]]),
    (
        "entidad_registro",
        &[&["ENTIDAD", "DE", "REGISTRO"], &["LUGAR", "DE", "REGISTRO"]],
    ),
];

pub const ACTA_LABELS: &[(&str, LabelAliases)] = &[
    (
        "curp",
        &[
            &["CLAVE", "UNICA", "DE", "REGISTRO", "DE", "POBLACION"],
            &["CURP"],
        ],
    ),
    ("entidad_registro", &[&["ENTIDAD", "DE", "REGISTRO"]]),
    ("municipio_registro", &[&["MUNICIPIO", "DE", "REGISTRO"]]),
    ("nombres", &[&["NOMBRE"], &["NOMBRES"]]),
    (
        "primer_apellido",
        &[&["PRIMER", "APELLIDO"], &["APELLIDO", "PATERNO"]],
    ),
    (
        "segundo_apellido",
        &[&["SEGUNDO", "APELLIDO"], &["APELLIDO", "MATERNO"]],
    ),
    ("sexo", &[&["SEXO"]]),
    ("fecha_nacimiento", &[&["FECHA", "DE", "NACIMIENTO"]]),
    ("lugar_nacimiento", &[&["LUGAR", "DE", "NACIMIENTO"]]),
];

fn aliases_for<'a>(labels: &'a [(&str, LabelAliases)], key: &str) -> LabelAliases {
    labels
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, a)| *a)
        .unwrap_or(&[])
}

// ---------------------------------------------------------------------------
// Layout extraction
// ---------------------------------------------------------------------------

/// Value collection for regex-narrowed fields: same line first, the lines
/// below as fallback when the pattern does not match.
fn grab_pattern(
    lines: &[Line],
    labels: &[(&str, LabelAliases)],
    key: &str,
    firsts: &HashSet<&'static str>,
    max_lines: usize,
    re: &Regex,
) -> Option<String> {
    let hit = find_label(lines, aliases_for(labels, key))?;
    let mut s = collect_right_same_line(lines, &hit, firsts);
    if !re.is_match(&s) {
        s = collect_below_until_next_label(lines, &hit, firsts, max_lines);
    }
    re.find(&s).map(|m| m.as_str().to_string())
}

/// Free-text fields: same line, else lines below.
fn grab_text(
    lines: &[Line],
    labels: &[(&str, LabelAliases)],
    key: &str,
    firsts: &HashSet<&'static str>,
    max_lines: usize,
) -> Option<String> {
    let hit = find_label(lines, aliases_for(labels, key))?;
    let s = collect_right_same_line(lines, &hit, firsts);
    let s = if s.is_empty() {
        collect_below_until_next_label(lines, &hit, firsts, max_lines)
    } else {
        s
    };
    (!s.is_empty()).then_some(s)
}

/// Layout-anchored extraction over the export geometry.
pub fn extract_fields(
    tipo_documento: DocType,
    raw_text: &str,
    export: Option<&OcrExport>,
) -> Fields {
    let mut out = Fields::new();
    let Some(export) = export else {
        return out;
    };
    let lines = build_lines(export);
    let t = normalize(raw_text);

    match tipo_documento {
        DocType::Ine => {
            let firsts = first_tokens(INE_LABELS);

            if let Some(hit) = find_label(&lines, aliases_for(INE_LABELS, "nombre")) {
                let nombre = collect_below_until_next_label(&lines, &hit, &firsts, 5);
                if !nombre.is_empty() {
                    cached_regex!(inline_sexo_re, r"\bSEXO\b\s*(H|M)\b");
                    let cleaned = inline_sexo_re().replace_all(&nombre, "");
                    out.insert("nombre".into(), normalize(&cleaned));
                }
            }

            if let Some(v) =
                grab_pattern(&lines, INE_LABELS, "sexo", &firsts, 1, sexo_regex())
            {
                out.insert("sexo".into(), v);
            }

            if let Some(hit) = find_label(&lines, aliases_for(INE_LABELS, "domicilio")) {
                let dom = collect_below_until_next_label(&lines, &hit, &firsts, 4);
                if !dom.is_empty() {
                    out.insert("domicilio".into(), dom);
                }
            }

            if let Some(v) = grab_pattern(
                &lines,
                INE_LABELS,
                "clave_elector",
                &firsts,
                2,
                clave_elector_regex(),
            ) {
                out.insert("clave_elector".into(), v);
            }

            if let Some(v) = grab_pattern(&lines, INE_LABELS, "curp", &firsts, 2, curp_regex()) {
                out.insert("curp".into(), v);
            }
            if !out.contains_key("curp") {
                if let Some(m) = curp_regex().find(&t) {
                    out.insert("curp".into(), m.as_str().to_string());
                }
            }

            if let Some(v) =
                grab_pattern(&lines, INE_LABELS, "anio_registro", &firsts, 1, year_regex())
            {
                out.insert("anio_registro".into(), v);
            }

            if let Some(v) = grab_pattern(
                &lines,
                INE_LABELS,
                "fecha_nacimiento",
                &firsts,
                2,
                date_regex(),
            ) {
                out.insert("fecha_nacimiento".into(), v);
            }
            if !out.contains_key("fecha_nacimiento") {
                if let Some(m) = date_regex().find(&t) {
                    out.insert("fecha_nacimiento".into(), m.as_str().to_string());
                }
            }

            if let Some(v) =
                grab_pattern(&lines, INE_LABELS, "seccion", &firsts, 1, seccion_regex())
            {
                out.insert("seccion".into(), v);
            }

            if let Some(v) =
                grab_pattern(&lines, INE_LABELS, "vigencia", &firsts, 1, vigencia_regex())
            {
                out.insert("vigencia".into(), v);
            }
        }

        DocType::Curp => {
            let firsts = first_tokens(CURP_LABELS);

            if let Some(v) = grab_pattern(&lines, CURP_LABELS, "curp", &firsts, 1, curp_regex()) {
                out.insert("curp".into(), v);
            }
            if !out.contains_key("curp") {
                if let Some(m) = curp_regex().find(&t) {
                    out.insert("curp".into(), m.as_str().to_string());
                }
            }
            if let Some(v) = grab_text(&lines, CURP_LABELS, "nombre", &firsts, 3) {
                out.insert("nombre".into(), v);
            }
            if let Some(v) = grab_text(&lines, CURP_LABELS, "entidad_registro", &firsts, 1) {
                out.insert("entidad_registro".into(), v);
            }
        }

        DocType::Acta => {
            let firsts = first_tokens(ACTA_LABELS);
            let mut grab = |key: &str, max_lines: usize, re: Option<&Regex>| {
                let value = match re {
                    Some(re) => grab_pattern(&lines, ACTA_LABELS, key, &firsts, max_lines, re),
                    None => grab_text(&lines, ACTA_LABELS, key, &firsts, max_lines),
                };
                if let Some(v) = value {
                    out.insert(key.into(), v);
                }
            };

            grab("curp", 1, Some(curp_regex()));
            grab("entidad_registro", 1, None);
            grab("municipio_registro", 1, None);
            grab("nombres", 2, None);
            grab("primer_apellido", 1, None);
            grab("segundo_apellido", 1, None);
            grab("sexo", 1, Some(sexo_regex()));
            grab("fecha_nacimiento", 1, Some(date_regex()));
            grab("lugar_nacimiento", 2, None);
        }

        DocType::Otros => {}
    }

    out
}

// ---------------------------------------------------------------------------
// Text-only extraction
// ---------------------------------------------------------------------------

/// Heuristic extraction over plain text with preserved line breaks.
pub fn extract_fields_text_only(tipo_documento: DocType, raw_text: &str) -> Fields {
    let t = normalize(raw_text);
    let u = normalize_keep_lines(raw_text);
    let mut out = Fields::new();

    tracing::debug!(tipo = %tipo_documento, len = t.len(), "text-only extraction");

    if let Some(m) = curp_regex().find(&t) {
        out.insert("curp".into(), m.as_str().to_string());
    }

    match tipo_documento {
        DocType::Ine => extract_ine_text(&t, &u, &mut out),
        DocType::Curp => extract_curp_text(&u, &mut out),
        DocType::Acta => extract_acta_text(&u, &mut out),
        DocType::Otros => extract_otros_text(raw_text, &t, &u, &mut out),
    }

    tracing::debug!(fields = out.len(), "text-only extraction done");
    out
}

fn insert_if_absent(out: &mut Fields, key: &str, value: String) {
    if !value.is_empty() {
        out.entry(key.to_string()).or_insert(value);
    }
}

fn first_lines(tail: &str, n: usize) -> String {
    tail.trim_start()
        .split('\n')
        .take(n)
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_ine_text(t: &str, u: &str, out: &mut Fields) {
    cached_regex!(sexo_line_re, r"(?m)^SEXO[ :]*\s*(HOMBRE|MUJER|H|M)\b");
    if let Some(c) = sexo_line_re().captures(u) {
        let v = if c[1].starts_with('M') { "M" } else { "H" };
        out.insert("sexo".into(), v.into());
    }

    cached_regex!(clave_label_re, r"(?m)^CLAVE\s*DE\s*ELECTOR\b");
    cached_regex!(alnum_run_re, r"[A-Z0-9]+");
    cached_regex!(clave_long_re, r"[A-Z0-9]{16,20}");
    if let Some(m) = clave_label_re().find(u) {
        let nxt = first_lines(&u[m.end()..], 2);
        let joined: String = alnum_run_re()
            .find_iter(&nxt)
            .map(|m| m.as_str())
            .collect();
        if let Some(m2) = clave_long_re().find(&joined) {
            insert_if_absent(out, "clave_elector", m2.as_str().to_string());
        }
    }
    if !out.contains_key("clave_elector") {
        cached_regex!(clave_next_re, r"(?m)^CLAVE\s*DE\s*ELECTOR\b[^\n]*\n?([A-Z0-9]{8,20})\b");
        if let Some(c) = clave_next_re().captures(u) {
            insert_if_absent(out, "clave_elector", c[1].to_string());
        }
    }

    cached_regex!(
        fecha_below_re,
        r"(?m)^FECHA\s*DE\s*NACIMIENTO\b[^\n]*\n+(\d{2}[/\-]\d{2}[/\-](?:19|20)\d{2})"
    );
    cached_regex!(
        fecha_anywhere_re,
        r"(?s)\bFECHA\s*DE\s*NACIMIENTO\b.*?(\d{2}[/\-]\d{2}[/\-](?:19|20)\d{2})"
    );
    let fecha = fecha_below_re()
        .captures(u)
        .or_else(|| fecha_anywhere_re().captures(t));
    if let Some(c) = fecha {
        insert_if_absent(out, "fecha_nacimiento", c[1].to_string());
    }

    cached_regex!(anio_label_re, r"(?m)^(?:ANODEREGISTRO|AN[O0I]{0,2}\s*DE\s*REGISTRO)\b");
    if let Some(m) = anio_label_re().find(u) {
        let nxt = first_lines(&u[m.end()..], 3);
        if let Some(m2) = year_regex().find(&nxt) {
            out.insert("anio_registro".into(), m2.as_str().to_string());
        }
    }

    cached_regex!(seccion_label_re, r"(?m)^SECCION\b");
    cached_regex!(caps_line_re, r"^[A-Z ]{3,}$");
    cached_regex!(small_number_re, r"^\d{1,5}$");
    if let Some(m) = seccion_label_re().find(u) {
        for line in u[m.end()..].trim_start().split('\n').take(4) {
            let line = line.trim();
            if line.is_empty() || line.contains('/') || line.contains('-') {
                continue;
            }
            if caps_line_re().is_match(line) {
                continue;
            }
            if let Some(m2) = small_number_re().find(line) {
                out.insert("seccion".into(), m2.as_str().to_string());
                break;
            }
        }
    }
    if !out.contains_key("seccion") {
        cached_regex!(seccion_anywhere_re, r"(?s)\bSECCION\b.*?(\d{1,5})");
        if let Some(c) = seccion_anywhere_re().captures(t) {
            out.insert("seccion".into(), c[1].to_string());
        }
    }

    cached_regex!(
        vigencia_below_re,
        r"(?m)^VIGENCIA\b[^\n]*\n*\s*((?:19|20)\d{2}\s*[-–]\s*(?:19|20)\d{2})"
    );
    cached_regex!(
        vigencia_anywhere_re,
        r"(?s)\bVIGENCIA\b.*?((?:19|20)\d{2}\s*[-–]\s*(?:19|20)\d{2})"
    );
    let vig = vigencia_below_re()
        .captures(u)
        .or_else(|| vigencia_anywhere_re().captures(t));
    if let Some(c) = vig {
        let squeezed: String = c[1]
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == '–' { '-' } else { c })
            .collect();
        out.insert("vigencia".into(), squeezed);
    }

    cached_regex!(
        nombre_block_re,
        r"(?ms)^NOMBRE\b(.*?)(?:\nSEXO\b|\nDOMICILIO\b|\nCLAVE\s*DE\s*ELECTOR\b|\nCURP\b)"
    );
    if let Some(c) = nombre_block_re().captures(u) {
        insert_if_absent(out, "nombre", normalize(&c[1]));
    }

    cached_regex!(
        domicilio_block_re,
        r"(?ms)^DOMICILIO\b(.*?)(?:\nCLAVE\b|\nCURP\b|\nAN[O0I]{0,2}\s*DE\s*REGISTRO\b|\nANODEREGISTRO\b|\nFECHA\b|\nSECCI)"
    );
    if let Some(c) = domicilio_block_re().captures(u) {
        insert_if_absent(out, "domicilio", normalize(&c[1]));
    }
}

fn extract_curp_text(u: &str, out: &mut Fields) {
    cached_regex!(entidad_label_re, r"(?m)^ENTIDAD\s*DE\s*REGISTRO\b");
    if let Some(m) = entidad_label_re().find(u) {
        let nxt = first_lines(&u[m.end()..], 4);
        if let Some(state) = find_state(&nxt) {
            out.insert("entidad_registro".into(), state);
        }
    }

    cached_regex!(
        curp_nombre_re,
        r"(?ms)^NOMBRES?\b(.*?)(?:\nSOY\b|\nFOLIO\b|\nENTIDAD\s*DE\s*REGISTRO\b|\nCURP\b)"
    );
    if let Some(c) = curp_nombre_re().captures(u) {
        insert_if_absent(out, "nombre", normalize(&c[1]));
    }
}

fn extract_acta_text(u: &str, out: &mut Fields) {
    let lines: Vec<&str> = u.split('\n').map(str::trim).collect();

    cached_regex!(entidad_full_re, r"^ENTIDAD\s*DE\s*REGISTRO$");
    if let Some(idx) = lines.iter().position(|l| entidad_full_re().is_match(l)) {
        let chunk = lines[idx + 1..]
            .iter()
            .take(4)
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(state) = find_state(&chunk) {
            out.insert("entidad_registro".into(), state);
        }
    }

    cached_regex!(municipio_full_re, r"^MUNICIPIO\s*DE\s*REGISTRO$");
    if let Some(idx) = lines.iter().position(|l| municipio_full_re().is_match(l)) {
        for cand in lines[idx + 1..].iter().take(3) {
            let val = only_letters_spaces(cand);
            if !val.is_empty() {
                out.insert("municipio_registro".into(), val);
                break;
            }
        }
    }

    // On the acta layout the values are printed above their labels, so
    // walk backwards from NOMBRE(S): segundo apellido is closest, then
    // primer apellido, then the given names.
    cached_regex!(nombres_full_re, r"^NOMBRE\(S\)$");
    if let Some(idx) = lines.iter().position(|l| nombres_full_re().is_match(l)) {
        let mut vals: Vec<String> = Vec::new();
        for line in lines[..idx].iter().rev() {
            if vals.len() >= 3 {
                break;
            }
            let v = only_letters_spaces(line);
            if !v.is_empty() {
                vals.push(v);
            }
        }
        if let Some(v) = vals.first() {
            insert_if_absent(out, "segundo_apellido", v.clone());
        }
        if let Some(v) = vals.get(1) {
            insert_if_absent(out, "primer_apellido", v.clone());
        }
        if let Some(v) = vals.get(2) {
            insert_if_absent(out, "nombres", v.clone());
        }
    }

    let value_labels = ["SEXO", "FECHA DE NACIMIENTO", "LUGAR DE NACIMIENTO"];
    let prev_nonlabel_lines = |start: usize, max_lookback: usize| -> Vec<&str> {
        let mut vals = Vec::new();
        for line in lines[..start].iter().rev().take(max_lookback) {
            let cand = line.trim();
            if cand.is_empty() || value_labels.contains(&cand) {
                continue;
            }
            vals.push(cand);
        }
        vals
    };

    cached_regex!(sexo_full_re, r"^SEXO$");
    if let Some(idx) = lines.iter().position(|l| sexo_full_re().is_match(l)) {
        for cand in prev_nonlabel_lines(idx, 6) {
            if let Some(letter) = sexo_letter(cand) {
                insert_if_absent(out, "sexo", letter.to_string());
                break;
            }
        }
    }

    cached_regex!(fecha_full_re, r"^FECHA\s*DE\s*NACIMIENTO$");
    if let Some(idx) = lines.iter().position(|l| fecha_full_re().is_match(l)) {
        for cand in prev_nonlabel_lines(idx, 6) {
            if let Some(m) = date_regex().find(cand) {
                insert_if_absent(out, "fecha_nacimiento", m.as_str().to_string());
                break;
            }
        }
    }

    cached_regex!(lugar_full_re, r"^LUGAR\s*DE\s*NACIMIENTO$");
    cached_regex!(sexo_word_re, r"^(HOMBRE|MUJER|H|M)$");
    if let Some(idx) = lines.iter().position(|l| lugar_full_re().is_match(l)) {
        for cand in prev_nonlabel_lines(idx, 8) {
            let tmp = only_letters_spaces(cand);
            if tmp.is_empty()
                || value_labels.contains(&tmp.as_str())
                || date_regex().is_match(cand)
                || sexo_word_re().is_match(&tmp)
            {
                continue;
            }
            insert_if_absent(out, "lugar_nacimiento", tmp);
            break;
        }
    }
}

const STOP_LABELS: &[&str] = &[
    "FOLIO",
    "IDENTIFICADOR ELECTRONICO",
    "CLAVE UNICA DE REGISTRO DE POBLACION",
    "CURP",
    "RFC",
    "NOMBRE",
    "NOMBRES",
    "NOMBRE(S)",
    "PRIMER APELLIDO",
    "SEGUNDO APELLIDO",
    "SEXO",
    "FECHA DE NACIMIENTO",
    "LUGAR DE NACIMIENTO",
    "DOMICILIO",
    "VIGENCIA",
    "ENTIDAD DE REGISTRO",
    "MUNICIPIO DE REGISTRO",
    "DATOS DE LA PERSONA REGISTRADA",
    "DATOS DE FILIACION",
    "CERTIFICACION",
];

const ISSUER_KEYWORDS: &[&str] = &[
    "SECRETARIA",
    "DIRECCION GENERAL",
    "SUBSECRETARIA",
    "UNIVERSIDAD",
    "INSTITUTO",
    "GOBIERNO",
    "AYUNTAMIENTO",
    "HOSPITAL",
    "CLINICA",
    "SERVICIOS DE SALUD",
    "COLEGIO",
    "TECNOLOGICO",
    "CONALEP",
    "IPN",
    "UNAM",
    "UAM",
    "SEP",
    "IMSS",
    "ISSSTE",
    "RENAPO",
    "REGISTRO CIVIL",
];

fn extract_otros_text(raw_text: &str, t: &str, u: &str, out: &mut Fields) {
    let lines: Vec<&str> = u
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut titulo = String::new();
    for line in lines.iter().take(50) {
        let l = only_letters_spaces(line);
        if l.is_empty() || STOP_LABELS.contains(&l.as_str()) {
            continue;
        }
        if l.len() >= 6 && l.split(' ').count() >= 2 {
            titulo = l;
            break;
        }
    }
    if titulo.is_empty() {
        for line in &lines {
            let l = only_letters_spaces(line);
            if l.len() >= 6 && l.split(' ').count() >= 2 {
                titulo = l;
                break;
            }
        }
    }
    if !titulo.is_empty() {
        out.insert("titulo".into(), titulo);
    }

    if let Some(d) = find_date(raw_text) {
        out.insert("fecha_documento".into(), d);
    }
    if let Some(c) = find_curp(raw_text) {
        out.insert("curp_detectada".into(), c);
    }
    if let Some(r) = find_rfc(raw_text) {
        out.insert("rfc_detectado".into(), r);
    }

    cached_regex!(folio_label_re, r"\bFOLIO\b");
    cached_regex!(folio_value_re, r"[A-Z0-9\-]{6,}");
    if let Some(m) = folio_label_re().find(u) {
        let nxt = first_lines(&u[m.end()..], 3);
        if let Some(m2) = folio_value_re().find(&normalize(&nxt)) {
            out.insert("folio".into(), m2.as_str().to_string());
        }
    }

    let mut emisor = String::new();
    for line in lines.iter().take(100) {
        let l = only_letters_spaces(line);
        if ISSUER_KEYWORDS.iter().any(|kw| l.contains(kw)) && l.len() > emisor.len() {
            emisor = l;
        }
    }
    if !emisor.is_empty() {
        out.insert("emisor".into(), emisor);
    }

    let _ = t;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detect_type_prefers_acta_over_curp_mention() {
        assert_eq!(
            detect_type("ACTA DE NACIMIENTO ... CURP: GOMC920101HDFRRL09"),
            Some(DocType::Acta)
        );
        assert_eq!(
            detect_type("INSTITUTO NACIONAL ELECTORAL CREDENCIAL PARA VOTAR"),
            Some(DocType::Ine)
        );
        assert_eq!(
            detect_type("CLAVE ÚNICA DE REGISTRO DE POBLACIÓN"),
            Some(DocType::Curp)
        );
        assert_eq!(detect_type("factura de servicios"), None);
    }

    #[test]
    fn ine_text_only_extracts_anchored_fields() {
        let text = "INSTITUTO NACIONAL ELECTORAL\n\
                    NOMBRE\nGOMEZ\nCRUZ\nJUAN\n\
                    SEXO H\n\
                    DOMICILIO\nC FLOR 12 COL CENTRO\n\
                    CLAVE DE ELECTOR\nGMCRJN92010109H100\n\n\
                    CURP GOMC920101HDFRRL09\n\
                    AÑO DE REGISTRO\n2010\n\
                    FECHA DE NACIMIENTO\n01/02/1992\n\
                    SECCIÓN\n0123\n\
                    VIGENCIA\n2020 - 2030";
        let out = extract_fields_text_only(DocType::Ine, text);
        assert_eq!(out["sexo"], "H");
        assert_eq!(out["clave_elector"], "GMCRJN92010109H100");
        assert_eq!(out["fecha_nacimiento"], "01/02/1992");
        assert_eq!(out["anio_registro"], "2010");
        assert_eq!(out["seccion"], "0123");
        assert_eq!(out["vigencia"], "2020-2030");
        assert_eq!(out["curp"], "GOMC920101HDFRRL09");
        assert_eq!(out["nombre"], "GOMEZ CRUZ JUAN");
    }

    #[test]
    fn curp_text_only_finds_state_and_name() {
        let text = "CLAVE UNICA DE REGISTRO DE POBLACION\n\
                    CURP GOMC920101HDFRRL09\n\
                    NOMBRE\nJUAN GOMEZ CRUZ\n\
                    ENTIDAD DE REGISTRO\nDISTRITO 5\nJALISCO";
        let out = extract_fields_text_only(DocType::Curp, text);
        assert_eq!(out["curp"], "GOMC920101HDFRRL09");
        assert_eq!(out["nombre"], "JUAN GOMEZ CRUZ");
        assert_eq!(out["entidad_registro"], "JALISCO");
    }

    #[test]
    fn acta_values_above_labels_walk_backwards() {
        let text = "ACTA DE NACIMIENTO\n\
                    JUAN\nGOMEZ\nCRUZ\nNOMBRE(S)\n\
                    HOMBRE\nSEXO\n\
                    01/02/1992\nFECHA DE NACIMIENTO\n\
                    GUADALAJARA\nLUGAR DE NACIMIENTO";
        let out = extract_fields_text_only(DocType::Acta, text);
        assert_eq!(out["segundo_apellido"], "CRUZ");
        assert_eq!(out["primer_apellido"], "GOMEZ");
        assert_eq!(out["nombres"], "JUAN");
        assert_eq!(out["sexo"], "H");
        assert_eq!(out["fecha_nacimiento"], "01/02/1992");
        assert_eq!(out["lugar_nacimiento"], "GUADALAJARA");
    }

    #[test]
    fn otros_scans_title_folio_and_issuer() {
        let text = "CONSTANCIA DE ESTUDIOS\n\
                    SECRETARIA DE EDUCACION PUBLICA\n\
                    FOLIO\nABC-123456\n\
                    expedida el 15/03/2024\n\
                    RFC GOMC920101AB1";
        let out = extract_fields_text_only(DocType::Otros, text);
        assert_eq!(out["titulo"], "CONSTANCIA DE ESTUDIOS");
        assert_eq!(out["folio"], "ABC-123456");
        assert_eq!(out["fecha_documento"], "15/03/2024");
        assert_eq!(out["rfc_detectado"], "GOMC920101AB1");
        assert!(out["emisor"].contains("SECRETARIA DE EDUCACION"));
    }

    fn export_from_lines(lines: Vec<Vec<(&str, [f64; 4])>>) -> OcrExport {
        let json_lines: Vec<_> = lines
            .into_iter()
            .map(|words| {
                json!({"words": words
                    .into_iter()
                    .map(|(v, g)| json!({"value": v, "geometry": g}))
                    .collect::<Vec<_>>()})
            })
            .collect();
        serde_json::from_value(json!({"pages": [{"blocks": [{"lines": json_lines}]}]})).unwrap()
    }

    #[test]
    fn layout_extraction_reads_value_right_of_label() {
        let export = export_from_lines(vec![
            vec![
                ("CURP", [0.1, 0.1, 0.2, 0.15]),
                ("GOMC920101HDFRRL09", [0.3, 0.1, 0.7, 0.15]),
            ],
            vec![("NOMBRE", [0.1, 0.2, 0.25, 0.25])],
            vec![("JUAN GOMEZ", [0.1, 0.3, 0.4, 0.35])],
        ]);
        let out = extract_fields(DocType::Curp, "CURP", Some(&export));
        assert_eq!(out["curp"], "GOMC920101HDFRRL09");
        assert_eq!(out["nombre"], "JUAN GOMEZ");
    }

    #[test]
    fn layout_extraction_without_export_is_empty() {
        assert!(extract_fields(DocType::Ine, "algo de texto", None).is_empty());
    }
}
