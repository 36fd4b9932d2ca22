//! PDF rendering of laid-out question papers.
//!
//! Uses the two standard Helvetica faces so nothing needs embedding. Text is
//! written WinAnsi-encoded; characters outside Latin-1 print as `?`.
//! CPU-bound, call from `spawn_blocking`.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::errors::AppError;
use crate::layout::paper::{PageLayout, PaperLayout};
use crate::layout::FontFace;

pub fn render_paper_pdf(layout: &PaperLayout) -> Result<Vec<u8>, AppError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = add_font(&mut doc, FontFace::Regular);
    let bold_id = add_font(&mut doc, FontFace::Bold);
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            FontFace::Regular.resource_name() => regular_id,
            FontFace::Bold.resource_name() => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(layout.pages.len());
    for page in &layout.pages {
        let content = page_content(page, layout);
        let encoded = content.encode().map_err(pdf_err)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            pt(layout.page_width).into(),
            pt(layout.page_height).into(),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| AppError::Pdf(format!("writing PDF: {e}")))?;
    Ok(bytes)
}

fn add_font(doc: &mut Document, face: FontFace) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => face.base_font(),
        "Encoding" => "WinAnsiEncoding",
    })
}

fn page_content(page: &PageLayout, layout: &PaperLayout) -> Content {
    let mut operations = Vec::new();

    for run in &page.runs {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![run.face.resource_name().into(), pt(run.size).into()],
        ));
        operations.push(Operation::new("Td", vec![pt(run.x).into(), pt(run.y).into()]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(encode_latin1(&run.text), StringFormat::Literal)],
        ));
        operations.push(Operation::new("ET", vec![]));
    }

    if !page.rules.is_empty() {
        operations.push(Operation::new("w", vec![1.into()]));
        let left = pt(layout.margin);
        let right = pt(layout.page_width - layout.margin);
        for &y in &page.rules {
            let y = pt(y);
            operations.push(Operation::new("m", vec![left.into(), y.into()]));
            operations.push(Operation::new("l", vec![right.into(), y.into()]));
            operations.push(Operation::new("S", vec![]));
        }
    }

    Content { operations }
}

/// Whole points are plenty for a printed paper.
fn pt(v: f32) -> i64 {
    v.round() as i64
}

fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn pdf_err(e: lopdf::Error) -> AppError {
    AppError::Pdf(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::paper::TextRun;

    fn run(text: &str, y: f32, face: FontFace) -> TextRun {
        TextRun {
            text: text.to_string(),
            x: 56.0,
            y,
            face,
            size: 11.0,
        }
    }

    fn layout(pages: Vec<PageLayout>) -> PaperLayout {
        PaperLayout {
            page_width: 595.0,
            page_height: 842.0,
            margin: 56.0,
            pages,
        }
    }

    fn shown_strings(bytes: &[u8]) -> Vec<Vec<String>> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|&page_id| {
                let data = doc.get_page_content(page_id).unwrap();
                Content::decode(&data)
                    .unwrap()
                    .operations
                    .into_iter()
                    .filter(|op| op.operator == "Tj")
                    .filter_map(|op| match op.operands.first() {
                        Some(Object::String(bytes, _)) => {
                            Some(bytes.iter().map(|&b| b as char).collect())
                        }
                        _ => None,
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_renders_one_pdf_page_per_layout_page() {
        let paper = layout(vec![
            PageLayout {
                runs: vec![run("Q1. Attempt any 2 of the following.", 700.0, FontFace::Bold)],
                rules: vec![720.0],
            },
            PageLayout {
                runs: vec![run("a)", 780.0, FontFace::Regular), run("Define a graph.", 780.0, FontFace::Regular)],
                rules: vec![],
            },
        ]);
        let bytes = render_paper_pdf(&paper).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let pages = shown_strings(&bytes);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], vec!["Q1. Attempt any 2 of the following."]);
        assert_eq!(pages[1], vec!["a)", "Define a graph."]);
    }

    #[test]
    fn test_empty_layout_still_produces_valid_pdf() {
        let bytes = render_paper_pdf(&layout(vec![PageLayout::default()])).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_encode_latin1_replaces_wide_chars() {
        assert_eq!(encode_latin1("café"), vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(encode_latin1("x≤y"), b"x?y".to_vec());
    }
}
