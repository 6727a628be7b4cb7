//! Field patterns and text normalization for Mexican identity documents
//!
//! All matching happens over accent-folded uppercase text; `normalize`
//! and friends are the single entry point for that folding so the same
//! rules apply to OCR output, PDF text layers, and stored records.

use std::sync::OnceLock;

use deunicode::deunicode;
use regex::Regex;

/// CURP: 4 letters, birth date, sex, state code, 3 consonants, homoclave, digit
pub const CURP_PATTERN: &str = concat!(
    r"[A-Z]{4}\d{6}[HM]",
    r"(AS|BC|BS|CC|CS|CH|CL|CM|CO|DF|DG|GJ|GT|GR|HG|JC|MC|MN|MS|NT|NL|OC|PL|QT|QR|SP|SL|SR|TC|TS|TL|VZ|YN|ZS|NE)",
    r"[A-Z]{3}[0-9A-Z]\d"
);
pub const RFC_PATTERN: &str = r"\b[A-Z&]{3,4}\d{6}[A-Z0-9]{3}\b";
pub const YEAR_PATTERN: &str = r"\b(19|20)\d{2}\b";
pub const DATE_PATTERN: &str = r"\b\d{2}[/\-]\d{2}[/\-](19|20)\d{2}\b";
pub const VIGENCIA_PATTERN: &str = r"\b(19|20)\d{2}(?:\s*[-–]\s*(19|20)\d{2})?\b";
pub const SECCION_PATTERN: &str = r"\b\d{1,5}\b";
pub const SEXO_PATTERN: &str = r"\b(H|M|HOMBRE|MUJER)\b";
pub const CLAVE_ELECTOR_PATTERN: &str = r"\b[A-Z0-9]{8,20}\b";

macro_rules! cached_regex {
    ($fn_name:ident, $pattern:expr) => {
        pub fn $fn_name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("valid pattern"))
        }
    };
}

cached_regex!(curp_regex, CURP_PATTERN);
cached_regex!(rfc_regex, RFC_PATTERN);
cached_regex!(year_regex, YEAR_PATTERN);
cached_regex!(date_regex, DATE_PATTERN);
cached_regex!(vigencia_regex, VIGENCIA_PATTERN);
cached_regex!(seccion_regex, SECCION_PATTERN);
cached_regex!(sexo_regex, SEXO_PATTERN);
cached_regex!(clave_elector_regex, CLAVE_ELECTOR_PATTERN);

/// Fold accents, uppercase, and collapse all whitespace to single spaces.
pub fn normalize(s: &str) -> String {
    let folded = deunicode(s).to_uppercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Like [`normalize`] but preserving line breaks; horizontal whitespace is
/// collapsed within each line.
pub fn normalize_keep_lines(s: &str) -> String {
    let folded = deunicode(s).to_uppercase();
    let unified = folded.replace("\r\n", "\n").replace('\r', "\n");
    unified
        .split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Normalized text reduced to letters and single spaces.
pub fn only_letters_spaces(s: &str) -> String {
    let norm = normalize(s);
    let letters: String = norm
        .chars()
        .map(|c| if c.is_ascii_uppercase() { c } else { ' ' })
        .collect();
    letters.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First match of `re` in the normalized form of `s`.
pub fn find_first(re: &Regex, s: &str) -> Option<String> {
    re.find(&normalize(s)).map(|m| m.as_str().to_string())
}

pub fn find_curp(s: &str) -> Option<String> {
    find_first(curp_regex(), s)
}

pub fn find_rfc(s: &str) -> Option<String> {
    find_first(rfc_regex(), s)
}

pub fn find_date(s: &str) -> Option<String> {
    find_first(date_regex(), s)
}

/// Reduce any sexo spelling to the single-letter form.
pub fn sexo_letter(s: &str) -> Option<&'static str> {
    let m = find_first(sexo_regex(), s)?;
    if m.starts_with('M') {
        Some("M")
    } else {
        Some("H")
    }
}

/// The 32 federal entities as they appear on CURP certificates and actas
pub const MEXICAN_STATES: &[&str] = &[
    "AGUASCALIENTES",
    "BAJA CALIFORNIA",
    "BAJA CALIFORNIA SUR",
    "CAMPECHE",
    "COAHUILA",
    "COLIMA",
    "CHIAPAS",
    "CHIHUAHUA",
    "CIUDAD DE MEXICO",
    "DURANGO",
    "GUANAJUATO",
    "GUERRERO",
    "HIDALGO",
    "JALISCO",
    "MEXICO",
    "MICHOACAN",
    "MORELOS",
    "NAYARIT",
    "NUEVO LEON",
    "OAXACA",
    "PUEBLA",
    "QUERETARO",
    "QUINTANA ROO",
    "SAN LUIS POTOSI",
    "SINALOA",
    "SONORA",
    "TABASCO",
    "TAMAULIPAS",
    "TLAXCALA",
    "VERACRUZ",
    "YUCATAN",
    "ZACATECAS",
];

pub fn is_mexican_state(s: &str) -> bool {
    MEXICAN_STATES.contains(&s)
}

/// Search letters-only text for a state name, longest window first so
/// "BAJA CALIFORNIA SUR" wins over "BAJA CALIFORNIA" and "MEXICO" does not
/// shadow "CIUDAD DE MEXICO".
pub fn find_state(s: &str) -> Option<String> {
    let text = only_letters_spaces(s);
    let tokens: Vec<&str> = text.split(' ').filter(|t| !t.is_empty()).collect();
    for n in (1..=3).rev() {
        if tokens.len() < n {
            continue;
        }
        for window in tokens.windows(n) {
            let candidate = window.join(" ");
            if is_mexican_state(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_accents_and_case() {
        assert_eq!(normalize("Sección  electoral\n número"), "SECCION ELECTORAL NUMERO");
        assert_eq!(normalize("año de registro"), "ANO DE REGISTRO");
    }

    #[test]
    fn normalize_keep_lines_preserves_breaks() {
        assert_eq!(normalize_keep_lines("uno  dos\r\ntres"), "UNO DOS\nTRES");
    }

    #[test]
    fn curp_pattern_accepts_valid_keys() {
        assert_eq!(
            find_curp("clave: GOMC920101HDFRRL09 fin"),
            Some("GOMC920101HDFRRL09".to_string())
        );
        // bad state code
        assert_eq!(find_curp("GOMC920101HXXRRL09"), None);
    }

    #[test]
    fn date_and_sexo_helpers() {
        assert_eq!(find_date("nacido el 01/02/1992"), Some("01/02/1992".into()));
        assert_eq!(find_date("01/02/2199"), None);
        assert_eq!(sexo_letter("SEXO MUJER"), Some("M"));
        assert_eq!(sexo_letter("H"), Some("H"));
        assert_eq!(sexo_letter("X"), None);
    }

    #[test]
    fn find_state_prefers_longest_match() {
        assert_eq!(
            find_state("entidad BAJA CALIFORNIA SUR registro"),
            Some("BAJA CALIFORNIA SUR".to_string())
        );
        assert_eq!(
            find_state("nacida en ciudad de méxico"),
            Some("CIUDAD DE MEXICO".to_string())
        );
        assert_eq!(find_state("sin entidad"), None);
    }

    #[test]
    fn rfc_detection() {
        assert_eq!(
            find_rfc("RFC: GOMC920101AB1"),
            Some("GOMC920101AB1".to_string())
        );
    }
}
