//! PDF text extraction module
//!
//! Extracts per-page text from PDF files using lopdf, keeping line breaks so
//! table rows survive for the chunker.

use crate::errors::IngestionError;
use std::path::Path;
use tracing::{debug, warn};

/// Text of one page, 1-based page number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Extract text from every page that has any
pub fn extract_pages(path: &Path) -> Result<Vec<PageText>, IngestionError> {
    let doc = lopdf::Document::load(path).map_err(|e| IngestionError::PdfParseError {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut extracted = Vec::with_capacity(pages.len());
    for (&number, &page_id) in pages.iter() {
        let raw = match doc.extract_text(&[number]) {
            Ok(text) => text,
            Err(e) => {
                debug!(page = number, error = %e, "Text extraction failed, reading content stream");
                match doc.get_page_content(page_id) {
                    Ok(content) => extract_text_from_content(&content),
                    Err(e) => {
                        warn!(page = number, error = %e, "Failed to read page content, skipping");
                        continue;
                    }
                }
            }
        };

        let text = clean_text(&raw);
        if !text.is_empty() {
            extracted.push(PageText { number, text });
        }
    }

    if extracted.is_empty() {
        return Err(IngestionError::NoText {
            path: path.display().to_string(),
        });
    }

    debug!(pages_with_text = extracted.len(), "Text extraction complete");
    Ok(extracted)
}

/// Extract text from a raw content stream, one line per text block
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;
    let mut current_text = String::new();

    for line in content_str.lines() {
        let trimmed = line.trim();

        if trimmed == "BT" {
            in_text_block = true;
            continue;
        }

        if trimmed == "ET" {
            in_text_block = false;
            if !current_text.is_empty() {
                text.push_str(&current_text);
                text.push('\n');
                current_text.clear();
            }
            continue;
        }

        if in_text_block {
            if let Some(text_content) = extract_text_from_operator(trimmed) {
                current_text.push_str(&text_content);
            }
        }
    }

    text
}

/// Extract text from a PDF text operator
fn extract_text_from_operator(line: &str) -> Option<String> {
    // (text) Tj, (text) ', (text) "
    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
            if start < end {
                return Some(decode_pdf_string(&line[start + 1..end]));
            }
        }
    }

    // [(text) num (text)] TJ
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut in_paren = false;
        let mut current = String::new();

        for ch in line.chars() {
            match ch {
                '(' => in_paren = true,
                ')' => {
                    in_paren = false;
                    result.push_str(&decode_pdf_string(&current));
                    current.clear();
                }
                _ if in_paren => current.push(ch),
                _ => {}
            }
        }

        if !result.is_empty() {
            return Some(result);
        }
    }

    None
}

/// Decode PDF string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some(c) => result.push(c),
                None => {}
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Normalise extracted text line by line.
///
/// Tabs and runs of spaces inside a line are kept because they separate
/// table cells.
fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .lines()
        .map(str::trim_end)
        .map(|line| line.trim_start_matches(' '))
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    fn write_pdf(path: &Path, pages: &[&[&str]]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for lines in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("TL", vec![14.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
            ];
            for line in lines.iter() {
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_extracts_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handbook.pdf");
        write_pdf(&path, &[&["Admissions open in June"], &[], &["Hostel rules apply"]]);

        let pages = extract_pages(&path).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert!(pages[0].text.contains("Admissions"));
        assert_eq!(pages[1].number, 3);
        assert!(pages[1].text.contains("Hostel"));
    }

    #[test]
    fn test_not_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"plain text, not a pdf").unwrap();

        assert!(matches!(
            extract_pages(&path),
            Err(IngestionError::PdfParseError { .. })
        ));
    }

    #[test]
    fn test_content_stream_fallback() {
        let content = b"BT\n/F1 12 Tf\n(Fee: 1200) Tj\nET\nBT\n[(Physics) -250 (Lab)] TJ\nET\n";
        assert_eq!(extract_text_from_content(content), "Fee: 1200\nPhysicsLab\n");
    }

    #[test]
    fn test_clean_text_keeps_cell_spacing() {
        let input = "\u{FEFF}  Course    Fee  \n\n\u{201C}Physics\u{201D}\t1200\n   \n";
        assert_eq!(clean_text(input), "Course    Fee\n\"Physics\"\t1200");
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string("Hello\\nWorld"), "Hello\nWorld");
        assert_eq!(decode_pdf_string("Test\\(paren\\)"), "Test(paren)");
    }
}
