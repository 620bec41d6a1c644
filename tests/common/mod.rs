#![allow(dead_code)]

use image::{ImageBuffer, Rgba};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use std::io::Cursor;
use std::path::Path;

/// Builds an A4 PDF with one page per entry. Each page shows its lines as
/// `(text, baseline y in PDF user space)` using Helvetica 11pt.
pub fn fixture_pdf(pages: &[&[(&str, i64)]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for (text, y) in lines.iter() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 11.into()]));
            operations.push(Operation::new("Td", vec![72.into(), (*y).into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// A rendered two-page contract with the signature line on the last page.
pub fn contract_pdf() -> Vec<u8> {
    fixture_pdf(&[
        &[("Rahmenvereinbarung", 780), ("Paragraph 1 Gegenstand", 740)],
        &[
            ("01.02.2025", 320),
            ("Unterschrift Schwertfels Consulting", 260),
            ("Unterschrift Acme GmbH", 260),
        ],
    ])
}

/// Glyph order of the embedded font used by [`wkhtmltopdf_style_pdf`].
const GLYPHS: &str = "Unterschif";

/// Builds a two-page A4 PDF laid out the way wkhtmltopdf writes pages.
///
/// The last page uses a flipped page matrix (`0.75 0 0 -0.75 0 842 cm`), a
/// text matrix flipping y back, and one `Td` + `Tj` per glyph through a
/// Type0/Identity-H font whose `ToUnicode` CMap maps glyph ids with a bfrange
/// array. The ascent (750) sits on the descendant font. Lines are given as
/// `(text, x, y)` in 96 dpi pixels from the top-left corner, drawn at 16px.
pub fn wkhtmltopdf_style_pdf(lines: &[(&str, i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let targets: Vec<String> = GLYPHS.chars().map(|c| format!("<{:04X}>", c as u32)).collect();
    let cmap = format!(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n\
         1 beginbfrange\n<0001> <{:04X}> [{}]\nendbfrange\n\
         endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n",
        targets.len(),
        targets.join(" ")
    );
    let cmap_id = doc.add_object(Stream::new(dictionary! {}, cmap.into_bytes()));
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => "DejaVuSans",
        "Flags" => 32,
        "Ascent" => 750,
        "Descent" => -250,
    });
    let descendant_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => "DejaVuSans",
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
    });
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "DejaVuSans",
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![descendant_id.into()],
        "ToUnicode" => cmap_id,
    });

    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![0.75.into(), 0.into(), 0.into(), (-0.75).into(), 0.into(), 842.into()],
        ),
    ];
    for (text, x, y) in lines {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F7".into(), 16.into()]));
        operations.push(Operation::new(
            "Tm",
            vec![1.into(), 0.into(), 0.into(), (-1).into(), 0.into(), 0.into()],
        ));
        let mut first = true;
        for c in text.chars() {
            if first {
                operations.push(Operation::new("Td", vec![(*x).into(), (-*y).into()]));
                first = false;
            } else {
                operations.push(Operation::new("Td", vec![9.into(), 0.into()]));
            }
            // Spaces are positioning only
            let Some(gid) = GLYPHS.chars().position(|g| g == c) else {
                continue;
            };
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(
                    vec![0, gid as u8 + 1],
                    StringFormat::Hexadecimal,
                )],
            ));
        }
        operations.push(Operation::new("ET", vec![]));
    }
    operations.push(Operation::new("Q", vec![]));

    let first_content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("ET", vec![]),
        ],
    };
    let first_id = doc.add_object(Stream::new(dictionary! {}, first_content.encode().unwrap()));
    let last_id = doc.add_object(Stream::new(
        dictionary! {},
        Content { operations }.encode().unwrap(),
    ));

    let mut kids = Vec::new();
    for content_id in [first_id, last_id] {
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F7" => font_id } },
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 2,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Operands of every `cm` directly followed by a `Do` on the last page, with
/// the XObject name.
pub fn last_page_image_placements(bytes: &[u8]) -> Vec<(String, Vec<f32>)> {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = *doc.get_pages().values().next_back().unwrap();
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
    content
        .operations
        .windows(2)
        .filter(|pair| pair[0].operator == "cm" && pair[1].operator == "Do")
        .map(|pair| {
            let name = pair[1].operands[0].as_name().unwrap();
            let values = pair[0]
                .operands
                .iter()
                .map(|o| o.as_float().unwrap())
                .collect();
            (String::from_utf8_lossy(name).into_owned(), values)
        })
        .collect()
}

pub fn png_bytes(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
    let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_pixel(width, height, Rgba(pixel));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Writes a stand-in for `wkhtmltopdf`, run as `sh <script> <args…>`.
///
/// The script checks that the body file exists and contains `must_contain`,
/// then copies `fixture` to the output path (the last argument).
#[cfg(unix)]
pub fn fake_renderer_script(dir: &Path, fixture: &Path, must_contain: &str) -> std::path::PathBuf {
    let script = dir.join("fake-wkhtmltopdf.sh");
    let body = format!(
        "#!/bin/sh\n\
         for arg; do body=\"$out\"; out=\"$arg\"; done\n\
         [ -f \"$body\" ] || {{ echo \"missing body $body\" >&2; exit 4; }}\n\
         grep -q '{}' \"$body\" || {{ echo \"marker missing\" >&2; exit 5; }}\n\
         cp '{}' \"$out\"\n",
        must_contain,
        fixture.display()
    );
    std::fs::write(&script, body).unwrap();
    script
}

/// Writes a stand-in renderer that always fails.
#[cfg(unix)]
pub fn failing_renderer_script(dir: &Path) -> std::path::PathBuf {
    let script = dir.join("failing-wkhtmltopdf.sh");
    std::fs::write(&script, "#!/bin/sh\necho 'render failed' >&2\nexit 3\n").unwrap();
    script
}

/// Number of image XObjects registered on the last page.
pub fn last_page_xobject_count(bytes: &[u8]) -> usize {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = *doc.get_pages().values().next_back().unwrap();
    contract2pdf::text::page_resources(&doc, page_id)
        .and_then(|r| r.get(b"XObject").ok())
        .and_then(|x| x.as_dict().ok())
        .map(|x| x.len())
        .unwrap_or(0)
}
