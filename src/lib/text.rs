//! Text positions on a PDF page.
//!
//! This is a small content-stream interpreter: it follows the graphics state
//! (`q`, `Q`, `cm`), the text state (`BT`, `Tf`, `TL`, `Td`, `TD`, `Tm`, `T*`)
//! and the show operators (`Tj`, `TJ`, `'`, `"`), and records one [`TextRun`]
//! per show operator with the decoded text and where it starts.
//!
//! Strings are decoded with the font encodings lopdf reads from the page
//! resources (`ToUnicode` CMaps, named and differences encodings). Bytes of a
//! font without a usable encoding are read one character each.
//!
//! Coordinates are reported in top-down page space: origin in the top-left
//! corner of the media box, y growing downwards, unit PDF points. That is the
//! space the compositor places images in.

use log::debug;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;

/// Ascent used when a font has no descriptor, as a fraction of the font size.
pub const DEFAULT_ASCENT: f32 = 0.8;

/// Runs whose baselines differ by less than this are on the same line.
const SAME_LINE_TOLERANCE: f32 = 0.5;

/// `TJ` adjustments below this (in thousandths of an em) read as a word gap.
const TJ_SPACE_THRESHOLD: f32 = -200.0;

/// One piece of text as drawn by a single show operator.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    /// Left edge of the run's start point
    pub x: f32,
    /// Baseline, top-down
    pub baseline: f32,
    /// Top of the glyph box, top-down; always `<= baseline`
    pub top: f32,
    /// Font size after text and graphics transforms
    pub font_size: f32,
}

/// Where a marker was found.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorHit {
    /// Index of the run in which the marker starts
    pub run_index: usize,
    pub x: f32,
    pub top: f32,
    pub baseline: f32,
}

/// Page geometry from the (possibly inherited) media box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageBox {
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

impl Default for PageBox {
    /// A4 in points
    fn default() -> Self {
        PageBox {
            x0: 0.0,
            y0: 0.0,
            x1: 595.0,
            y1: 842.0,
        }
    }
}

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f32, ty: f32) -> Matrix {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`
    fn then(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn vertical_scale(&self) -> f32 {
        let [_, _, c, d, _, _] = self.0;
        (c * c + d * d).sqrt()
    }
}

#[derive(Debug, Clone)]
struct TextState {
    font: Option<Vec<u8>>,
    size: f32,
    leading: f32,
}

/// Extracts all text runs from a page, in content order.
pub fn page_text_runs(doc: &Document, page_id: ObjectId) -> Result<Vec<TextRun>, lopdf::Error> {
    let page_box = page_box(doc, page_id);
    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let encodings: BTreeMap<Vec<u8>, _> = fonts
        .iter()
        .filter_map(|(name, font)| match font.get_font_encoding(doc) {
            Ok(encoding) => Some((name.clone(), encoding)),
            Err(e) => {
                debug!("No encoding for font {}: {}", String::from_utf8_lossy(name), e);
                None
            }
        })
        .collect();
    let ascents: BTreeMap<Vec<u8>, f32> = fonts
        .iter()
        .filter_map(|(name, font)| font_ascent(doc, font).map(|a| (name.clone(), a)))
        .collect();
    let content_bytes = doc.get_page_content(page_id)?;
    let content = Content::decode(&content_bytes)?;

    let mut runs = Vec::new();
    let mut ctm = Matrix::IDENTITY;
    let mut ctm_stack: Vec<Matrix> = Vec::new();
    let mut tm = Matrix::IDENTITY;
    let mut tlm = Matrix::IDENTITY;
    let mut state = TextState {
        font: None,
        size: 0.0,
        leading: 0.0,
    };

    for op in &content.operations {
        let nums = || -> Vec<f32> {
            op.operands
                .iter()
                .filter_map(|o| o.as_float().ok())
                .collect()
        };
        match op.operator.as_str() {
            "q" => ctm_stack.push(ctm),
            "Q" => ctm = ctm_stack.pop().unwrap_or(Matrix::IDENTITY),
            "cm" => {
                if let Some(m) = matrix_from(&nums()) {
                    ctm = m.then(&ctm);
                }
            }
            "BT" => {
                tm = Matrix::IDENTITY;
                tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    state.font = Some(name.clone());
                }
                if let Some(size) = op.operands.get(1).and_then(|o| o.as_float().ok()) {
                    state.size = size;
                }
            }
            "TL" => {
                if let Some(l) = nums().first() {
                    state.leading = *l;
                }
            }
            "Td" | "TD" => {
                let n = nums();
                if n.len() == 2 {
                    if op.operator == "TD" {
                        state.leading = -n[1];
                    }
                    tlm = Matrix::translate(n[0], n[1]).then(&tlm);
                    tm = tlm;
                }
            }
            "Tm" => {
                if let Some(m) = matrix_from(&nums()) {
                    tlm = m;
                    tm = m;
                }
            }
            "T*" => {
                tlm = Matrix::translate(0.0, -state.leading).then(&tlm);
                tm = tlm;
            }
            "Tj" | "TJ" | "'" | "\"" => {
                if op.operator == "'" || op.operator == "\"" {
                    tlm = Matrix::translate(0.0, -state.leading).then(&tlm);
                    tm = tlm;
                }
                let encoding = state.font.as_deref().and_then(|name| encodings.get(name));
                let decode = |bytes: &[u8]| match encoding {
                    Some(encoding) => Document::decode_text(encoding, bytes)
                        .unwrap_or_else(|_| byte_chars(bytes)),
                    None => byte_chars(bytes),
                };
                let text = show_operand_text(&op.operator, &op.operands, &decode);
                if text.is_empty() {
                    continue;
                }
                let trm = tm.then(&ctm);
                let font_size = state.size * trm.vertical_scale();
                let ascent = state
                    .font
                    .as_deref()
                    .and_then(|name| ascents.get(name))
                    .copied()
                    .unwrap_or(DEFAULT_ASCENT);
                let baseline = page_box.y1 - trm.0[5];
                runs.push(TextRun {
                    text,
                    x: trm.0[4] - page_box.x0,
                    baseline,
                    top: baseline - ascent * font_size,
                    font_size,
                });
            }
            _ => {}
        }
    }

    debug!("Found {} text runs on page {:?}", runs.len(), page_id);
    Ok(runs)
}

/// Finds the first occurrence of `marker`, in content order.
///
/// Consecutive runs sharing a baseline are joined before searching, so a
/// marker drawn by several show operators is still found. The hit reports the
/// run in which the marker starts.
pub fn find_anchor(runs: &[TextRun], marker: &str) -> Option<AnchorHit> {
    if marker.is_empty() {
        return None;
    }
    let mut start = 0;
    while start < runs.len() {
        let mut end = start + 1;
        while end < runs.len()
            && (runs[end].baseline - runs[start].baseline).abs() < SAME_LINE_TOLERANCE
        {
            end += 1;
        }

        let mut line = String::new();
        let mut offsets = Vec::with_capacity(end - start);
        for run in &runs[start..end] {
            offsets.push(line.len());
            line.push_str(&run.text);
        }
        if let Some(pos) = line.find(marker) {
            let within = offsets.iter().rposition(|o| *o <= pos).unwrap_or(0);
            let run_index = start + within;
            let run = &runs[run_index];
            return Some(AnchorHit {
                run_index,
                x: run.x,
                top: run.top,
                baseline: run.baseline,
            });
        }
        start = end;
    }
    None
}

/// Reads the page's media box, walking up the page tree if it is inherited.
pub fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let mut current = doc.get_dictionary(page_id).ok();
    let mut depth = 0;
    while let Some(dict) = current {
        if let Ok(obj) = dict.get(b"MediaBox") {
            let values: Vec<f32> = resolve(doc, obj)
                .and_then(|o| o.as_array().ok())
                .map(|arr| arr.iter().filter_map(|v| v.as_float().ok()).collect())
                .unwrap_or_default();
            if values.len() == 4 {
                return PageBox {
                    x0: values[0].min(values[2]),
                    y0: values[1].min(values[3]),
                    x1: values[0].max(values[2]),
                    y1: values[1].max(values[3]),
                };
            }
        }
        depth += 1;
        if depth > 16 {
            break;
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok())
            .and_then(|id| doc.get_dictionary(id).ok());
    }
    PageBox::default()
}

/// Returns the page's resource dictionary, following references and
/// inheritance from parent page-tree nodes.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut current = doc.get_dictionary(page_id).ok();
    let mut depth = 0;
    while let Some(dict) = current {
        if let Ok(obj) = dict.get(b"Resources") {
            return resolve(doc, obj).and_then(|o| o.as_dict().ok());
        }
        depth += 1;
        if depth > 16 {
            break;
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok())
            .and_then(|id| doc.get_dictionary(id).ok());
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn matrix_from(values: &[f32]) -> Option<Matrix> {
    if values.len() == 6 {
        Some(Matrix([
            values[0], values[1], values[2], values[3], values[4], values[5],
        ]))
    } else {
        None
    }
}

fn show_operand_text(
    operator: &str,
    operands: &[Object],
    decode: &dyn Fn(&[u8]) -> String,
) -> String {
    let mut text = String::new();
    match operator {
        "TJ" => {
            if let Some(Object::Array(items)) = operands.first() {
                for item in items {
                    match item {
                        Object::String(bytes, _) => text.push_str(&decode(bytes)),
                        other => {
                            if let Ok(adjust) = other.as_float() {
                                if adjust < TJ_SPACE_THRESHOLD && !text.ends_with(' ') {
                                    text.push(' ');
                                }
                            }
                        }
                    }
                }
            }
        }
        // The string is the last operand of Tj, ' and ".
        _ => {
            if let Some(Object::String(bytes, _)) = operands.last() {
                text.push_str(&decode(bytes));
            }
        }
    }
    text
}

fn byte_chars(bytes: &[u8]) -> String {
    bytes.iter().map(|b| char::from(*b)).collect()
}

fn font_ascent(doc: &Document, font: &Dictionary) -> Option<f32> {
    let descriptor = match font.get(b"FontDescriptor") {
        Ok(obj) => resolve(doc, obj).and_then(|o| o.as_dict().ok()),
        // Type0 fonts keep the descriptor on the descendant font.
        Err(_) => font
            .get(b"DescendantFonts")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| arr.first())
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())
            .and_then(|d| d.get(b"FontDescriptor").ok())
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok()),
    }?;
    let ascent = descriptor.get(b"Ascent").ok()?.as_float().ok()?;
    if ascent > 0.0 {
        Some(ascent / 1000.0)
    } else {
        None
    }
}
