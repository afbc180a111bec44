//! PDF text and metadata extraction

use lopdf::{Dictionary, Document, Object};
use std::collections::BTreeMap;

/// Text and metadata pulled from a PDF
#[derive(Debug, Clone, Default)]
pub struct PdfContent {
    pub title: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

const INFO_KEYS: &[(&[u8], &str)] = &[
    (b"Title", "title"),
    (b"Author", "author"),
    (b"Subject", "subject"),
    (b"Creator", "creator"),
    (b"Producer", "producer"),
    (b"CreationDate", "created"),
    (b"ModDate", "modified"),
];

/// Parses a PDF and extracts its text and document info
///
/// Fails only if the bytes are not a readable PDF. Text extraction problems
/// on individual pages leave the text empty but keep the metadata.
pub fn extract_pdf(bytes: &[u8]) -> Result<PdfContent, lopdf::Error> {
    let document = Document::load_mem(bytes)?;

    let pages: Vec<u32> = document.get_pages().keys().copied().collect();

    let mut metadata = BTreeMap::new();
    metadata.insert("pages".to_string(), pages.len().to_string());

    if let Some(info) = info_dictionary(&document) {
        for &(key, name) in INFO_KEYS {
            if let Some(value) = info_string(info, key).filter(|v| !v.is_empty()) {
                metadata.insert(name.to_string(), value);
            }
        }
    }

    let text = if pages.is_empty() {
        String::new()
    } else {
        document.extract_text(&pages).unwrap_or_else(|e| {
            tracing::debug!("PDF text extraction failed: {}", e);
            String::new()
        })
    };

    Ok(PdfContent {
        title: metadata.get("title").cloned().unwrap_or_default(),
        text,
        metadata,
    })
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn info_string(info: &Dictionary, key: &[u8]) -> Option<String> {
    let bytes = info.get(key).ok()?.as_str().ok()?;
    Some(decode_pdf_string(bytes).trim().to_string())
}

/// Decodes a PDF text string: UTF-16BE with a byte order mark, else bytes as-is
fn decode_pdf_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream};

    /// Builds a one-page PDF with `lines` of text and an info dictionary
    fn sample_pdf(title: &str, author: &str, lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let mut operations = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
            operations.push(Operation::new("Td", vec![72.into(), (720 - 20 * i as i64).into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Author" => Object::string_literal(author),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_extracts_text_and_metadata() {
        let bytes = sample_pdf(
            "CPSC 221 Final",
            "Jane Doe",
            &["CPSC 221 Final Exam", "Question 1 Heaps"],
        );
        let pdf = extract_pdf(&bytes).unwrap();

        assert_eq!(pdf.title, "CPSC 221 Final");
        assert!(pdf.text.contains("CPSC 221 Final Exam"), "{:?}", pdf.text);
        assert!(pdf.text.contains("Question 1 Heaps"), "{:?}", pdf.text);
        assert_eq!(pdf.metadata.get("author").map(String::as_str), Some("Jane Doe"));
        assert_eq!(pdf.metadata.get("pages").map(String::as_str), Some("1"));
        assert!(!pdf.metadata.contains_key("subject"));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(extract_pdf(b"%PDF-1.4 this is not really a pdf").is_err());
        assert!(extract_pdf(b"").is_err());
    }

    #[test]
    fn test_decode_utf16_title() {
        let bytes = [0xFE, 0xFF, 0x00, b'M', 0x00, b'T', 0x00, b'1'];
        assert_eq!(decode_pdf_string(&bytes), "MT1");
    }

    #[test]
    fn test_decode_plain_title() {
        assert_eq!(decode_pdf_string(b"CPSC 221 Final"), "CPSC 221 Final");
    }
}
