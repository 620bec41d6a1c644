//! Stamp and signature placement on the last page of a rendered contract.
//!
//! Instead of absolute coordinates, both images are positioned relative to a
//! text marker (by default `Unterschrift`), so the images follow the signature
//! line when the template layout shifts.
//!
//! Geometry is expressed in top-down page space (origin in the top-left
//! corner, y grows downwards, unit PDF points). With `a` the top of the first
//! marker occurrence on the last page:
//!
//! ```text
//! stamp top      = a - stamp.height + clearance
//! signature top  = a - signature.height - clearance
//! ```
//!
//! Horizontal position and size of both images come from the layout and do not
//! depend on the marker.
//!
//! The stamp is drawn first and the signature second, so the signature lies on
//! top where the two overlap. The existing page content is wrapped in `q … Q`
//! so that graphics state left over by the renderer cannot distort the images.

use crate::images::ImageAsset;
use crate::text::{self, AnchorHit, PageBox};
use crate::ContractError;
use log::{debug, info, warn};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

pub const DEFAULT_ANCHOR: &str = "Unterschrift";
pub const DEFAULT_CLEARANCE: f32 = 20.0;

/// Horizontal origin and size of one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub width: f32,
    pub height: f32,
}

/// A rectangle in top-down page space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn x1(&self) -> f32 {
        self.x + self.width
    }

    pub fn y1(&self) -> f32 {
        self.y + self.height
    }
}

/// Where the stamp and signature go, relative to which marker.
#[derive(Debug, Clone, PartialEq)]
pub struct StampLayout {
    pub anchor: String,
    pub stamp: Placement,
    pub signature: Placement,
    /// Vertical distance between the marker line and the images
    pub clearance: f32,
    /// Treat a missing marker as an error instead of skipping the images
    pub require_anchor: bool,
}

impl Default for StampLayout {
    fn default() -> Self {
        StampLayout {
            anchor: DEFAULT_ANCHOR.to_string(),
            stamp: Placement {
                x: 30.0,
                width: 170.0,
                height: 170.0,
            },
            signature: Placement {
                x: -20.0,
                width: 280.0,
                height: 70.0,
            },
            clearance: DEFAULT_CLEARANCE,
            require_anchor: false,
        }
    }
}

impl StampLayout {
    /// Computes the stamp and signature rectangles, in that order, for a
    /// marker whose top is at `anchor_top`.
    pub fn rects(&self, anchor_top: f32) -> (Rect, Rect) {
        let stamp = Rect {
            x: self.stamp.x,
            y: anchor_top - self.stamp.height + self.clearance,
            width: self.stamp.width,
            height: self.stamp.height,
        };
        let signature = Rect {
            x: self.signature.x,
            y: anchor_top - self.signature.height - self.clearance,
            width: self.signature.width,
            height: self.signature.height,
        };
        (stamp, signature)
    }
}

/// Result of [`stamp_last_page`].
#[derive(Debug, Clone, PartialEq)]
pub enum StampOutcome {
    /// Both images were drawn
    Stamped {
        bytes: Vec<u8>,
        anchor: AnchorHit,
        stamp: Rect,
        signature: Rect,
    },
    /// The marker is not on the last page; the input bytes are returned as-is
    AnchorMissing(Vec<u8>),
}

impl StampOutcome {
    pub fn is_stamped(&self) -> bool {
        matches!(self, StampOutcome::Stamped { .. })
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            StampOutcome::Stamped { bytes, .. } => bytes,
            StampOutcome::AnchorMissing(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            StampOutcome::Stamped { bytes, .. } => bytes,
            StampOutcome::AnchorMissing(bytes) => bytes,
        }
    }
}

/// Draws `stamp` and `signature` on the last page of `pdf`, next to the first
/// occurrence of the layout's marker.
///
/// # Errors
/// Returns [`ContractError::DocumentError`] if the PDF cannot be parsed, has
/// no pages, cannot be modified or saved, or when the marker is missing and
/// the layout requires it. No partial output is produced on error.
pub fn stamp_last_page(
    pdf: &[u8],
    layout: &StampLayout,
    stamp: &ImageAsset,
    signature: &ImageAsset,
) -> Result<StampOutcome, ContractError> {
    let mut doc = Document::load_mem(pdf).map_err(|e| document_error("Failed to load PDF", e))?;

    let page_id = *doc
        .get_pages()
        .values()
        .next_back()
        .ok_or_else(|| ContractError::DocumentError {
            message: "The rendered PDF has no pages".to_string(),
            suggestion: "Check that the contract template produces visible content".to_string(),
        })?;

    let runs = text::page_text_runs(&doc, page_id)
        .map_err(|e| document_error("Failed to read the last page", e))?;

    let Some(anchor) = text::find_anchor(&runs, &layout.anchor) else {
        if layout.require_anchor {
            return Err(ContractError::DocumentError {
                message: format!("Marker '{}' not found on the last page", layout.anchor),
                suggestion: "Make sure the signature block is on the last page and contains the marker text".to_string(),
            });
        }
        warn!(
            "Marker '{}' not found on the last page; signature and stamp are not placed",
            layout.anchor
        );
        return Ok(StampOutcome::AnchorMissing(pdf.to_vec()));
    };
    debug!("Marker '{}' found at {:?}", layout.anchor, anchor);

    let (stamp_rect, signature_rect) = layout.rects(anchor.top);
    let page_box = text::page_box(&doc, page_id);

    let stamp_id = stamp.embed(&mut doc);
    let signature_id = signature.embed(&mut doc);
    let stamp_name = format!("Stamp{}", stamp_id.0);
    let signature_name = format!("Signature{}", signature_id.0);

    register_xobjects(
        &mut doc,
        page_id,
        &[(stamp_name.as_str(), stamp_id), (signature_name.as_str(), signature_id)],
    )
    .map_err(|e| document_error("Failed to register images on the last page", e))?;

    let mut operations = Vec::new();
    operations.extend(draw_image_ops(&stamp_name, &stamp_rect, &page_box));
    operations.extend(draw_image_ops(&signature_name, &signature_rect, &page_box));
    append_overlay(&mut doc, page_id, operations)
        .map_err(|e| document_error("Failed to draw images on the last page", e))?;

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| document_error("Failed to save PDF", e))?;

    info!(
        "Placed stamp at {:?} and signature at {:?}",
        stamp_rect, signature_rect
    );
    Ok(StampOutcome::Stamped {
        bytes,
        anchor,
        stamp: stamp_rect,
        signature: signature_rect,
    })
}

fn document_error(context: &str, err: impl std::fmt::Display) -> ContractError {
    ContractError::DocumentError {
        message: format!("{}: {}", context, err),
        suggestion: "Check that the renderer produced a valid, unencrypted PDF".to_string(),
    }
}

/// `q w 0 0 h x y cm /Name Do Q`, converting the top-down rectangle to PDF
/// user space.
fn draw_image_ops(name: &str, rect: &Rect, page_box: &PageBox) -> Vec<Operation> {
    let x = page_box.x0 + rect.x;
    let y = page_box.y1 - rect.y1();
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                rect.width.into(),
                0.into(),
                0.into(),
                rect.height.into(),
                x.into(),
                y.into(),
            ],
        ),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

/// Adds image XObjects to the page's own resource dictionary. Inherited or
/// shared resources are copied onto the page first, so other pages are not
/// affected.
fn register_xobjects(
    doc: &mut Document,
    page_id: ObjectId,
    entries: &[(&str, ObjectId)],
) -> Result<(), lopdf::Error> {
    let mut resources = text::page_resources(doc, page_id)
        .cloned()
        .unwrap_or_else(Dictionary::new);
    let mut xobjects = match resources.get(b"XObject") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id)?.clone(),
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    for (name, id) in entries {
        xobjects.set(name.as_bytes().to_vec(), Object::Reference(*id));
    }
    resources.set("XObject", xobjects);

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Resources", resources);
    Ok(())
}

/// Wraps the page's existing content in `q … Q` and appends `operations` as
/// a new content stream.
fn append_overlay(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), lopdf::Error> {
    let mut existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            Object::Array(items) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let overlay = Content { operations }.encode()?;
    let mut overlay_bytes = b"\nQ\n".to_vec();
    overlay_bytes.extend_from_slice(&overlay);
    overlay_bytes.push(b'\n');

    let prelude_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay_bytes));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(prelude_id));
    contents.append(&mut existing);
    contents.push(Object::Reference(overlay_id));

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Contents", Object::Array(contents));
    Ok(())
}
