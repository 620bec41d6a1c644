//! Prints the text runs found on the last page of a PDF together with their
//! top-down coordinates, and where the signature anchor would be found.
//! Useful to calibrate `[stamp]` and `[signature]` placements.

use contract2pdf::compositor::{StampLayout, DEFAULT_ANCHOR};
use contract2pdf::text;
use lopdf::{Document, Object};
use std::env;

fn dump_stream(obj: &Object) {
    match obj {
        Object::Stream(s) => match s.decompressed_content() {
            Ok(bytes) => println!(
                "--- stream text start ---\n{}\n--- stream text end ---",
                String::from_utf8_lossy(&bytes)
            ),
            Err(_) => println!(
                "--- stream text start ---\n{}\n--- stream text end ---",
                String::from_utf8_lossy(&s.content)
            ),
        },
        _ => println!("not a stream: {:?}", obj),
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: inspect_pdf <file.pdf> [anchor] [--content]");
        std::process::exit(2);
    }
    let anchor = args
        .get(2)
        .filter(|a| !a.starts_with("--"))
        .map(String::as_str)
        .unwrap_or(DEFAULT_ANCHOR);
    let show_content = args.iter().any(|a| a == "--content");

    let doc = match Document::load(&args[1]) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("failed to load: {:?}", e);
            std::process::exit(1)
        }
    };

    let pages = doc.get_pages();
    println!("PDF version: {}", doc.version);
    println!("Pages: {}", pages.len());
    let Some((number, page_id)) = pages.iter().next_back() else {
        println!("No pages");
        return;
    };

    let page_box = text::page_box(&doc, *page_id);
    println!(
        "Last page: {} {:?} ({:.1} x {:.1} pt)",
        number,
        page_id,
        page_box.width(),
        page_box.height()
    );

    if show_content {
        for content_id in doc.get_page_contents(*page_id) {
            if let Ok(obj) = doc.get_object(content_id) {
                dump_stream(obj);
            }
        }
    }

    let runs = match text::page_text_runs(&doc, *page_id) {
        Ok(runs) => runs,
        Err(e) => {
            eprintln!("failed to read page content: {:?}", e);
            std::process::exit(1)
        }
    };
    for (i, run) in runs.iter().enumerate() {
        println!(
            "{:4}  x={:7.2} top={:7.2} baseline={:7.2} size={:5.2}  {:?}",
            i, run.x, run.top, run.baseline, run.font_size, run.text
        );
    }

    match text::find_anchor(&runs, anchor) {
        Some(hit) => {
            println!(
                "Anchor {:?} in run {} at x={:.2} top={:.2}",
                anchor, hit.run_index, hit.x, hit.top
            );
            let layout = StampLayout {
                anchor: anchor.to_string(),
                ..StampLayout::default()
            };
            let (stamp, signature) = layout.rects(hit.top);
            println!("Default stamp rect:     {:?}", stamp);
            println!("Default signature rect: {:?}", signature);
        }
        None => println!("Anchor {:?} not found on the last page", anchor),
    }
}
