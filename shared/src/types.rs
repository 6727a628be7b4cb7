//! Common types used across the service

use serde::{Deserialize, Serialize};

/// Supported document kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    /// INE voter credential (image)
    Ine,
    /// CURP certificate (PDF)
    Curp,
    /// Birth certificate / acta de nacimiento (PDF)
    Acta,
    /// Any other document
    Otros,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Ine => "ine",
            DocType::Curp => "curp",
            DocType::Acta => "acta",
            DocType::Otros => "otros",
        }
    }

    /// Parse a form value. `auto` and unknown values map to `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ine" => Some(DocType::Ine),
            "curp" => Some(DocType::Curp),
            "acta" => Some(DocType::Acta),
            "otros" => Some(DocType::Otros),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which extraction candidate a merged field value came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Template,
    Auto,
    Text,
    None,
}

/// Quality verdict for an uploaded document image
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Ok,
    Warn,
    Bad,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_type_parse_is_case_insensitive() {
        assert_eq!(DocType::parse("INE"), Some(DocType::Ine));
        assert_eq!(DocType::parse(" acta "), Some(DocType::Acta));
        assert_eq!(DocType::parse("auto"), None);
        assert_eq!(DocType::parse(""), None);
    }

    #[test]
    fn doc_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&DocType::Curp).unwrap(), "\"curp\"");
    }
}
