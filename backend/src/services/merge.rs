//! Candidate merge
//!
//! Three extraction candidates compete per field: template boxes, layout
//! anchoring ("auto"), and text-only heuristics. Pattern-backed fields take
//! the first candidate whose value matches the pattern, in template, auto,
//! text order; free-text fields take the first non-empty candidate in the
//! same order. Every decision is recorded for the debug block.

use regex::Regex;

use shared::{
    clave_elector_regex, curp_regex, date_regex, seccion_regex, sexo_regex, vigencia_regex,
    year_regex, CandidateSource, DocType, FieldDecision,
};

use crate::services::parsers::Fields;

fn pattern_ok(pat: Option<&Regex>, val: &str) -> bool {
    if val.is_empty() {
        return false;
    }
    match pat {
        Some(re) => re.is_match(&val.to_uppercase()),
        None => true,
    }
}

fn choose(
    name: &str,
    pat: Option<&Regex>,
    tpl: &Fields,
    auto: &Fields,
    text: &Fields,
    out: &mut Fields,
    decisions: &mut Vec<FieldDecision>,
) {
    let t = tpl.get(name).map(|s| s.trim()).unwrap_or("");
    let a = auto.get(name).map(|s| s.trim()).unwrap_or("");
    let x = text.get(name).map(|s| s.trim()).unwrap_or("");

    let (src, val) = if pat.is_some() {
        if pattern_ok(pat, t) {
            (CandidateSource::Template, t)
        } else if pattern_ok(pat, a) {
            (CandidateSource::Auto, a)
        } else if pattern_ok(pat, x) {
            (CandidateSource::Text, x)
        } else if !t.is_empty() {
            (CandidateSource::Template, t)
        } else if !a.is_empty() {
            (CandidateSource::Auto, a)
        } else if !x.is_empty() {
            (CandidateSource::Text, x)
        } else {
            (CandidateSource::None, "")
        }
    } else if !t.is_empty() {
        (CandidateSource::Template, t)
    } else if !a.is_empty() {
        (CandidateSource::Auto, a)
    } else if !x.is_empty() {
        (CandidateSource::Text, x)
    } else {
        (CandidateSource::None, "")
    };

    out.insert(name.to_string(), val.to_string());
    decisions.push(FieldDecision {
        field: name.to_string(),
        chosen_from: src,
        value: val.to_string(),
    });
}

fn field_plan(tipo: DocType) -> Vec<(&'static str, Option<&'static Regex>)> {
    match tipo {
        DocType::Ine => vec![
            ("nombre", None),
            ("sexo", Some(sexo_regex())),
            ("domicilio", None),
            ("clave_elector", Some(clave_elector_regex())),
            ("curp", Some(curp_regex())),
            ("anio_registro", Some(year_regex())),
            ("fecha_nacimiento", Some(date_regex())),
            ("seccion", Some(seccion_regex())),
            ("vigencia", Some(vigencia_regex())),
        ],
        DocType::Curp => vec![
            ("curp", Some(curp_regex())),
            ("nombre", None),
            ("entidad_registro", None),
        ],
        DocType::Acta => vec![
            ("curp", Some(curp_regex())),
            ("entidad_registro", None),
            ("municipio_registro", None),
            ("nombres", None),
            ("primer_apellido", None),
            ("segundo_apellido", None),
            ("sexo", Some(sexo_regex())),
            ("fecha_nacimiento", Some(date_regex())),
            ("lugar_nacimiento", None),
        ],
        DocType::Otros => vec![],
    }
}

fn expected_keys(tipo: DocType) -> &'static [&'static str] {
    match tipo {
        DocType::Ine => &[
            "nombre",
            "sexo",
            "domicilio",
            "clave_elector",
            "curp",
            "anio_registro",
            "fecha_nacimiento",
            "seccion",
            "vigencia",
        ],
        DocType::Curp => &["curp", "nombre", "entidad_registro"],
        DocType::Acta => &[
            "curp",
            "entidad_registro",
            "municipio_registro",
            "nombres",
            "primer_apellido",
            "segundo_apellido",
            "sexo",
            "fecha_nacimiento",
            "lugar_nacimiento",
        ],
        DocType::Otros => &[
            "titulo",
            "fecha_documento",
            "rfc_detectado",
            "curp_detectada",
            "folio",
            "emisor",
        ],
    }
}

/// Merge candidates into the final field map, expected keys always present.
pub fn smart_merge_fields(
    tipo_documento: DocType,
    tpl: &Fields,
    auto: &Fields,
    text: &Fields,
) -> (Fields, Vec<FieldDecision>) {
    let mut fields = Fields::new();
    let mut decisions = Vec::new();

    if tipo_documento == DocType::Otros {
        // overlays, text candidate winning over auto winning over template
        let mut merged = tpl.clone();
        merged.extend(auto.clone());
        merged.extend(text.clone());
        for (k, v) in merged {
            let src = if text.contains_key(&k) {
                CandidateSource::Text
            } else if auto.contains_key(&k) {
                CandidateSource::Auto
            } else {
                CandidateSource::Template
            };
            decisions.push(FieldDecision {
                field: k.clone(),
                chosen_from: src,
                value: v.clone(),
            });
            fields.insert(k, v);
        }
    } else {
        for (name, pat) in field_plan(tipo_documento) {
            choose(name, pat, tpl, auto, text, &mut fields, &mut decisions);
        }
    }

    for k in expected_keys(tipo_documento) {
        fields.entry(k.to_string()).or_default();
    }

    (fields, decisions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn template_wins_when_pattern_matches() {
        let tpl = fields(&[("curp", "GOMC920101HDFRRL09")]);
        let text = fields(&[("curp", "GOMC920101HDFRRL00")]);
        let (out, decisions) =
            smart_merge_fields(DocType::Curp, &tpl, &Fields::new(), &text);
        assert_eq!(out["curp"], "GOMC920101HDFRRL09");
        let d = decisions.iter().find(|d| d.field == "curp").unwrap();
        assert_eq!(d.chosen_from, CandidateSource::Template);
    }

    #[test]
    fn pattern_failure_falls_through_to_text() {
        let tpl = fields(&[("fecha_nacimiento", "ILEGIBLE")]);
        let text = fields(&[("fecha_nacimiento", "01/02/1992")]);
        let (out, decisions) =
            smart_merge_fields(DocType::Ine, &tpl, &Fields::new(), &text);
        assert_eq!(out["fecha_nacimiento"], "01/02/1992");
        let d = decisions
            .iter()
            .find(|d| d.field == "fecha_nacimiento")
            .unwrap();
        assert_eq!(d.chosen_from, CandidateSource::Text);
    }

    #[test]
    fn non_matching_values_still_surface_in_order() {
        let tpl = fields(&[("seccion", "SIN NUMERO")]);
        let (out, decisions) =
            smart_merge_fields(DocType::Ine, &tpl, &Fields::new(), &Fields::new());
        assert_eq!(out["seccion"], "SIN NUMERO");
        let d = decisions.iter().find(|d| d.field == "seccion").unwrap();
        assert_eq!(d.chosen_from, CandidateSource::Template);
    }

    #[test]
    fn expected_keys_always_present() {
        let (out, _) = smart_merge_fields(
            DocType::Acta,
            &Fields::new(),
            &Fields::new(),
            &Fields::new(),
        );
        assert_eq!(out.len(), 9);
        assert!(out.values().all(String::is_empty));
    }

    #[test]
    fn otros_text_overlays_template() {
        let tpl = fields(&[("titulo", "TITULO VIEJO"), ("folio", "ABC-123456")]);
        let text = fields(&[("titulo", "CONSTANCIA DE ESTUDIOS")]);
        let (out, _) = smart_merge_fields(DocType::Otros, &tpl, &Fields::new(), &text);
        assert_eq!(out["titulo"], "CONSTANCIA DE ESTUDIOS");
        assert_eq!(out["folio"], "ABC-123456");
        assert!(out.contains_key("emisor"));
    }
}
