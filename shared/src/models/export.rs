//! OCR export geometry model
//!
//! Mirrors the page/block/line/word export produced by docTR-style OCR
//! engines. Word geometry arrives in several historical shapes (a 4-tuple,
//! a pair of points, or an object with `x0..y1` keys), so bounding boxes
//! are coerced from the raw JSON value rather than deserialized strictly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Full OCR export for a document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrExport {
    #[serde(default)]
    pub pages: Vec<PageExport>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageExport {
    #[serde(default)]
    pub blocks: Vec<BlockExport>,
    /// Page pixel dimensions when the engine reports them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<(u32, u32)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockExport {
    #[serde(default)]
    pub lines: Vec<LineExport>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineExport {
    #[serde(default)]
    pub words: Vec<WordExport>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WordExport {
    #[serde(default)]
    pub value: String,
    /// Raw geometry payload, coerced via [`BBox::from_geometry`]
    #[serde(default)]
    pub geometry: Value,
}

/// Normalized bounding box with coordinates in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Default for BBox {
    fn default() -> Self {
        Self {
            xmin: 0.0,
            ymin: 0.0,
            xmax: 1.0,
            ymax: 1.0,
        }
    }
}

impl BBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        let (xmin, xmax) = if x0 <= x1 { (x0, x1) } else { (x1, x0) };
        let (ymin, ymax) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        Self {
            xmin: xmin.clamp(0.0, 1.0),
            ymin: ymin.clamp(0.0, 1.0),
            xmax: xmax.clamp(0.0, 1.0),
            ymax: ymax.clamp(0.0, 1.0),
        }
    }

    /// Coerce any of the known geometry encodings into a box.
    ///
    /// Unknown shapes fall back to the whole page rather than failing; a
    /// word with broken geometry should degrade, not abort extraction.
    pub fn from_geometry(geom: &Value) -> Self {
        match geom {
            Value::Object(map) => {
                let get = |k: &str, default: f64| {
                    map.get(k).and_then(Value::as_f64).unwrap_or(default)
                };
                BBox::new(get("x0", 0.0), get("y0", 0.0), get("x1", 1.0), get("y1", 1.0))
            }
            Value::Array(_) => {
                let mut nums = Vec::with_capacity(4);
                flatten_numbers(geom, &mut nums);
                if nums.len() >= 4 {
                    BBox::new(nums[0], nums[1], nums[2], nums[3])
                } else {
                    BBox::default()
                }
            }
            _ => BBox::default(),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }
}

fn flatten_numbers(value: &Value, out: &mut Vec<f64>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_numbers(item, out);
            }
        }
        other => {
            if let Some(n) = other.as_f64() {
                out.push(n);
            }
        }
    }
}

impl OcrExport {
    /// Total word count across all pages
    pub fn word_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|p| &p.blocks)
            .flat_map(|b| &b.lines)
            .map(|l| l.words.len())
            .sum()
    }

    /// Flatten the export into plain text, one OCR line per text line and
    /// pages separated by a blank line.
    pub fn flatten_text(&self) -> String {
        let mut pages = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let mut lines = Vec::new();
            for block in &page.blocks {
                for line in &block.lines {
                    let words: Vec<&str> = line
                        .words
                        .iter()
                        .map(|w| w.value.as_str())
                        .filter(|v| !v.is_empty())
                        .collect();
                    if !words.is_empty() {
                        lines.push(words.join(" "));
                    }
                }
            }
            pages.push(lines.join("\n"));
        }
        pages.join("\n\n").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bbox_from_flat_array() {
        let b = BBox::from_geometry(&json!([0.1, 0.2, 0.3, 0.4]));
        assert_eq!(b, BBox::new(0.1, 0.2, 0.3, 0.4));
    }

    #[test]
    fn bbox_from_point_pair() {
        let b = BBox::from_geometry(&json!([[0.1, 0.2], [0.3, 0.4]]));
        assert_eq!(b, BBox::new(0.1, 0.2, 0.3, 0.4));
    }

    #[test]
    fn bbox_from_object() {
        let b = BBox::from_geometry(&json!({"x0": 0.5, "y0": 0.6, "x1": 0.2, "y1": 0.1}));
        // corners are reordered
        assert_eq!(b.xmin, 0.2);
        assert_eq!(b.ymin, 0.1);
    }

    #[test]
    fn bbox_from_garbage_is_full_page() {
        assert_eq!(BBox::from_geometry(&json!("nope")), BBox::default());
        assert_eq!(BBox::from_geometry(&json!([0.1, 0.2])), BBox::default());
    }

    #[test]
    fn bbox_clamps_out_of_range() {
        let b = BBox::from_geometry(&json!([-0.5, 0.0, 1.7, 0.9]));
        assert_eq!(b.xmin, 0.0);
        assert_eq!(b.xmax, 1.0);
    }

    #[test]
    fn flatten_text_joins_lines_and_pages() {
        let export: OcrExport = serde_json::from_value(json!({
            "pages": [
                {"blocks": [{"lines": [
                    {"words": [{"value": "HOLA", "geometry": [0.0, 0.0, 0.1, 0.1]},
                               {"value": "MUNDO", "geometry": [0.2, 0.0, 0.3, 0.1]}]},
                ]}]},
                {"blocks": [{"lines": [
                    {"words": [{"value": "DOS", "geometry": [0.0, 0.0, 0.1, 0.1]}]},
                ]}]}
            ]
        }))
        .unwrap();
        assert_eq!(export.flatten_text(), "HOLA MUNDO\n\nDOS");
        assert_eq!(export.word_count(), 3);
    }
}
