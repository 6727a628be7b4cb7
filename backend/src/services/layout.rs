//! Line/word layout built from OCR export geometry
//!
//! The export arrives as pages of blocks of lines of words with normalized
//! bounding boxes. Field extraction anchors on label token sequences and
//! then collects values to the right of the label or in the lines below
//! it, so this module rebuilds a reading-ordered line model first.

use std::collections::HashSet;

use shared::{normalize, BBox, OcrExport};

/// A single OCR word with its normalized text and box
#[derive(Debug, Clone)]
pub struct Word {
    pub text: String,
    pub norm: String,
    pub bbox: BBox,
}

impl Word {
    fn new(text: &str, geometry: &serde_json::Value) -> Self {
        Self {
            text: text.to_string(),
            norm: normalize(text),
            bbox: BBox::from_geometry(geometry),
        }
    }
}

/// A reading-ordered OCR line
#[derive(Debug, Clone)]
pub struct Line {
    pub page: usize,
    pub words: Vec<Word>,
    pub ymin: f64,
    pub ymax: f64,
}

impl Line {
    fn vertical_center(&self) -> f64 {
        (self.ymin + self.ymax) / 2.0
    }
}

/// A located label occurrence
#[derive(Debug, Clone)]
pub struct LabelHit {
    /// Index into the line vector
    pub line_index: usize,
    pub page: usize,
    /// Right edge of the matched label tokens
    pub xmax: f64,
}

/// Label alias spellings, each a token sequence in normalized form
pub type LabelAliases = &'static [&'static [&'static str]];

/// Rebuild reading-ordered lines from the export.
pub fn build_lines(export: &OcrExport) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    for (page_idx, page) in export.pages.iter().enumerate() {
        for block in &page.blocks {
            for line in &block.lines {
                let mut words: Vec<Word> = line
                    .words
                    .iter()
                    .filter(|w| !w.value.is_empty() && !w.geometry.is_null())
                    .map(|w| Word::new(&w.value, &w.geometry))
                    .collect();
                if words.is_empty() {
                    continue;
                }
                words.sort_by(|a, b| {
                    a.bbox
                        .xmin
                        .total_cmp(&b.bbox.xmin)
                        .then(a.bbox.center().0.total_cmp(&b.bbox.center().0))
                });
                let ymin = words.iter().map(|w| w.bbox.ymin).fold(1.0_f64, f64::min);
                let ymax = words.iter().map(|w| w.bbox.ymax).fold(0.0_f64, f64::max);
                lines.push(Line {
                    page: page_idx,
                    words,
                    ymin,
                    ymax,
                });
            }
        }
    }
    lines.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then(a.vertical_center().total_cmp(&b.vertical_center()))
    });
    lines
}

/// Match a token sequence within a line starting at `start`. Tokens must
/// appear in order but other words may sit between them (OCR often splits
/// labels around logos and glyph noise).
fn match_sequence(line: &Line, seq: &[&str], start: usize) -> Option<(usize, f64, f64)> {
    let mut k = start;
    for token in seq {
        let mut found = false;
        while k < line.words.len() {
            let hit = line.words[k].norm == *token;
            k += 1;
            if hit {
                found = true;
                break;
            }
        }
        if !found {
            return None;
        }
    }
    let end = k - 1;
    let xmin = line.words[start..=end]
        .iter()
        .map(|w| w.bbox.xmin)
        .fold(f64::INFINITY, f64::min);
    let xmax = line.words[start..=end]
        .iter()
        .map(|w| w.bbox.xmax)
        .fold(f64::NEG_INFINITY, f64::max);
    Some((end, xmin, xmax))
}

/// Find the first occurrence of any alias spelling of a label.
pub fn find_label(lines: &[Line], aliases: LabelAliases) -> Option<LabelHit> {
    for (line_index, line) in lines.iter().enumerate() {
        for (word_index, word) in line.words.iter().enumerate() {
            for seq in aliases {
                if seq.first() == Some(&word.norm.as_str()) {
                    if let Some((_, _, xmax)) = match_sequence(line, seq, word_index) {
                        return Some(LabelHit {
                            line_index,
                            page: line.page,
                            xmax,
                        });
                    }
                }
            }
        }
    }
    None
}

/// Leading tokens of every alias, used to recognize "the next label starts
/// here" while collecting multi-line values.
pub fn first_tokens(labels: &[(&str, LabelAliases)]) -> HashSet<&'static str> {
    let mut set = HashSet::new();
    for (_, aliases) in labels {
        for seq in *aliases {
            if let Some(first) = seq.first() {
                set.insert(*first);
            }
        }
    }
    set
}

fn line_contains_label(line: &Line, label_first_tokens: &HashSet<&'static str>) -> bool {
    line.words
        .iter()
        .take(3)
        .any(|w| label_first_tokens.contains(w.norm.as_str()))
}

/// Words on the label's own line, right of the label, stopping at the next
/// label token.
pub fn collect_right_same_line(
    lines: &[Line],
    hit: &LabelHit,
    stop_at: &HashSet<&'static str>,
) -> String {
    let line = &lines[hit.line_index];
    let mut out: Vec<&str> = Vec::new();
    for word in &line.words {
        if word.bbox.xmin <= hit.xmax + 0.01 {
            continue;
        }
        if stop_at.contains(word.norm.as_str()) {
            break;
        }
        out.push(&word.text);
    }
    normalize(&out.join(" "))
}

/// Words from the lines below the label (same page), up to `max_lines`
/// lines or until a line that starts with another label.
pub fn collect_below_until_next_label(
    lines: &[Line],
    hit: &LabelHit,
    label_first_tokens: &HashSet<&'static str>,
    max_lines: usize,
) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut collected = 0;
    for line in lines.iter().skip(hit.line_index + 1) {
        if line.page != hit.page {
            continue;
        }
        if collected >= max_lines {
            break;
        }
        if line_contains_label(line, label_first_tokens) {
            break;
        }
        out.extend(line.words.iter().map(|w| w.text.as_str()));
        collected += 1;
    }
    normalize(&out.join(" "))
}
