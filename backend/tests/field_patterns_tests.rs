//! Tests for field patterns and text normalization
//! Verifies that identity document values validate the same way across
//! OCR output, PDF text layers, and stored records.

use shared::{
    clave_elector_regex, curp_regex, find_curp, find_date, find_rfc, find_state, normalize,
    normalize_keep_lines, only_letters_spaces, sexo_letter, vigencia_regex,
};

// =============================================================================
// CURP validation
// =============================================================================

mod curp_patterns {
    use super::*;

    #[test]
    fn accepts_valid_curp_with_every_field_in_place() {
        for curp in [
            "GOMC920101HDFRRL09",
            "AAAA000101MNERRR01",
            "XEXX010101HNEXXXA8",
        ] {
            assert!(curp_regex().is_match(curp), "should accept {curp}");
        }
    }

    #[test]
    fn rejects_malformed_curps() {
        // wrong sex letter, bad state code, short tail
        for curp in [
            "GOMC920101XDFRRL09",
            "GOMC920101HXXRRL09",
            "GOMC920101HDFRRL",
        ] {
            assert!(!curp_regex().is_match(curp), "should reject {curp}");
        }
    }

    #[test]
    fn finds_curp_inside_noisy_accented_text() {
        let text = "clave única: gomc920101hdfrrl09 — registro civil";
        assert_eq!(find_curp(text), Some("GOMC920101HDFRRL09".to_string()));
    }
}

// =============================================================================
// Dates, RFC, vigencia
// =============================================================================

mod value_patterns {
    use super::*;

    #[test]
    fn dates_require_a_plausible_century() {
        assert_eq!(find_date("01/02/1992"), Some("01/02/1992".into()));
        assert_eq!(find_date("01-02-2024"), Some("01-02-2024".into()));
        assert_eq!(find_date("01/02/2199"), None);
        assert_eq!(find_date("1/2/1992"), None);
    }

    #[test]
    fn rfc_with_homoclave() {
        assert_eq!(find_rfc("RFC: GOMC920101AB1"), Some("GOMC920101AB1".into()));
        assert_eq!(find_rfc("sin rfc aquí"), None);
    }

    #[test]
    fn vigencia_accepts_single_year_and_ranges() {
        assert!(vigencia_regex().is_match("2024"));
        assert!(vigencia_regex().is_match("2020 - 2030"));
        assert!(!vigencia_regex().is_match("24-30"));
    }

    #[test]
    fn clave_elector_length_bounds() {
        assert!(clave_elector_regex().is_match("GMCRJN92010109H100"));
        assert!(!clave_elector_regex().is_match("ABC12"));
    }
}

// =============================================================================
// Normalization
// =============================================================================

mod normalization {
    use super::*;

    #[test]
    fn accents_fold_to_ascii_uppercase() {
        assert_eq!(normalize("Sección  Año\tNúmero"), "SECCION ANO NUMERO");
    }

    #[test]
    fn keep_lines_preserves_structure_only() {
        let text = "PRIMER  APELLIDO\r\nGÓMEZ\n\nCRUZ";
        assert_eq!(normalize_keep_lines(text), "PRIMER APELLIDO\nGOMEZ\n\nCRUZ");
    }

    #[test]
    fn letters_only_drops_digits_and_punctuation() {
        assert_eq!(only_letters_spaces("C. FLOR #12, COL-CENTRO"), "C FLOR COL CENTRO");
    }

    #[test]
    fn sexo_reduces_to_single_letter() {
        assert_eq!(sexo_letter("HOMBRE"), Some("H"));
        assert_eq!(sexo_letter("sexo: mujer"), Some("M"));
        assert_eq!(sexo_letter("N/A"), None);
    }
}

// =============================================================================
// State resolution
// =============================================================================

mod state_resolution {
    use super::*;

    #[test]
    fn longest_state_name_wins() {
        assert_eq!(
            find_state("registrado en BAJA CALIFORNIA SUR"),
            Some("BAJA CALIFORNIA SUR".into())
        );
        assert_eq!(
            find_state("entidad ciudad de méxico 09"),
            Some("CIUDAD DE MEXICO".into())
        );
    }

    #[test]
    fn plain_mexico_still_resolves() {
        assert_eq!(find_state("ESTADO DE MEXICO"), Some("MEXICO".into()));
    }

    #[test]
    fn no_state_in_ordinary_text() {
        assert_eq!(find_state("DISTRITO QUINTO SECCION 12"), None);
    }
}
