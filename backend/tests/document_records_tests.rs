//! Tests for extraction record and user index models
//! Verifies the stored JSON wire format stays compatible with existing
//! records and that component key sets match the extraction field sets.

use serde_json::json;
use shared::{component_keys, DocType, ExtractRecord, OcrExport, UserIndex};

// =============================================================================
// Record wire format
// =============================================================================

mod record_wire_format {
    use super::*;

    #[test]
    fn camel_case_ids_survive_roundtrip() {
        let mut rec = ExtractRecord::new("user-9", DocType::Acta);
        rec.archivo_id = Some("ocr_20250101_120000_ab12cd".into());
        rec.fields.insert("nombres".into(), "JUAN".into());
        rec.ts = Some(1_735_000_000.5);

        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["usuarioID"], "user-9");
        assert_eq!(value["archivoID"], "ocr_20250101_120000_ab12cd");
        assert_eq!(value["tipo_documento"], "acta");
        assert!(value.get("usuario_id").is_none());

        let back: ExtractRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.fields["nombres"], "JUAN");
        assert_eq!(back.ts, Some(1_735_000_000.5));
    }

    #[test]
    fn older_records_without_optional_fields_still_parse() {
        let value = json!({
            "usuarioID": "u1",
            "tipo_documento": "ine",
            "raw_text": "texto",
        });
        let rec: ExtractRecord = serde_json::from_value(value).unwrap();
        assert_eq!(rec.confidence, 1.0);
        assert!(rec.fields.is_empty());
        assert!(rec.archivo_id.is_none());
        assert!(rec.storage.is_none());
    }

    #[test]
    fn debug_block_is_omitted_when_absent() {
        let rec = ExtractRecord::new("u1", DocType::Otros);
        let value = serde_json::to_value(&rec).unwrap();
        assert!(value.get("debug").is_none());
    }
}

// =============================================================================
// User index
// =============================================================================

mod user_index {
    use super::*;

    #[test]
    fn upsert_dedupes_and_latest_uses_timestamp() {
        let mut idx = UserIndex::new("u1");
        idx.upsert(DocType::Ine, "ocr_a", 10.0);
        idx.upsert(DocType::Ine, "ocr_b", 30.0);
        idx.upsert(DocType::Ine, "ocr_c", 20.0);
        idx.upsert(DocType::Ine, "ocr_b", 5.0);

        assert_eq!(idx.docs["ine"].len(), 3);
        assert_eq!(idx.latest(DocType::Ine).unwrap().archivo_id, "ocr_c");
    }

    #[test]
    fn index_wire_format_keeps_doc_type_keys() {
        let mut idx = UserIndex::new("u2");
        idx.upsert(DocType::Curp, "ocr_x", 1.0);
        let value = serde_json::to_value(&idx).unwrap();
        assert_eq!(value["usuarioID"], "u2");
        assert_eq!(value["docs"]["curp"][0]["archivoID"], "ocr_x");
    }
}

// =============================================================================
// Component keys
// =============================================================================

mod components {
    use super::*;

    #[test]
    fn each_type_exposes_its_field_set() {
        assert_eq!(component_keys(DocType::Ine).len(), 9);
        assert_eq!(component_keys(DocType::Curp).len(), 3);
        assert_eq!(component_keys(DocType::Acta).len(), 9);
        assert_eq!(component_keys(DocType::Otros).len(), 6);
    }

    #[test]
    fn keys_are_unique_within_a_type() {
        for tipo in [DocType::Ine, DocType::Curp, DocType::Acta, DocType::Otros] {
            let keys: Vec<&str> = component_keys(tipo).iter().map(|k| k.key).collect();
            let mut deduped = keys.clone();
            deduped.sort_unstable();
            deduped.dedup();
            assert_eq!(keys.len(), deduped.len(), "duplicate key for {tipo}");
        }
    }
}

// =============================================================================
// Export ingestion
// =============================================================================

mod export_ingestion {
    use super::*;

    #[test]
    fn engine_export_with_mixed_geometry_parses() {
        let export: OcrExport = serde_json::from_value(json!({
            "pages": [{
                "dimensions": [1024, 634],
                "blocks": [{"lines": [
                    {"words": [
                        {"value": "NOMBRE", "geometry": [[0.1, 0.1], [0.3, 0.15]]},
                        {"value": "JUAN", "geometry": [0.35, 0.1, 0.5, 0.15]},
                        {"value": "GOMEZ", "geometry": {"x0": 0.55, "y0": 0.1, "x1": 0.7, "y1": 0.15}},
                    ]},
                ]}]
            }]
        }))
        .unwrap();
        assert_eq!(export.word_count(), 3);
        assert_eq!(export.flatten_text(), "NOMBRE JUAN GOMEZ");
        assert_eq!(export.pages[0].dimensions, Some((1024, 634)));
    }
}
