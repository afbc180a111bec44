//! Content type sniffing
//!
//! Looks at the first 512 bytes of a body. The HTML tag scan follows the
//! WHATWG MIME sniffing algorithm; binary signatures come from `infer` and
//! the text check from `content_inspector`.

use content_inspector::ContentType;

/// Bytes inspected by [`detect_content_type`]
pub const SNIFF_LEN: usize = 512;

pub const OCTET_STREAM: &str = "application/octet-stream";

const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Guesses the content type of `data`
///
/// HTML and XML prefixes are checked first, then known binary signatures,
/// then whether the bytes read as text at all. Always returns a valid MIME
/// type; unknown binary data is `application/octet-stream`.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    let start = data
        .iter()
        .position(|&b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());
    let trimmed = &data[start..];

    if HTML_TAGS.iter().any(|tag| matches_html_tag(trimmed, tag)) {
        return "text/html; charset=utf-8";
    }

    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    if let Some(kind) = infer::get(data) {
        return kind.mime_type();
    }

    match content_inspector::inspect(data) {
        ContentType::UTF_8 | ContentType::UTF_8_BOM => "text/plain; charset=utf-8",
        ContentType::UTF_16LE => "text/plain; charset=utf-16le",
        ContentType::UTF_16BE => "text/plain; charset=utf-16be",
        _ => OCTET_STREAM,
    }
}

/// Combines the sniffed type with the server's `Content-Type`
///
/// The sniffed type wins unless it is the generic octet-stream and the
/// server sent something more specific.
pub fn resolve_content_type(sniffed: &str, declared: Option<&str>) -> String {
    match declared.map(str::trim) {
        Some(declared) if sniffed == OCTET_STREAM && !declared.is_empty() => declared.to_string(),
        _ => sniffed.to_string(),
    }
}

/// The lowercase essence of a MIME type, without parameters
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn matches_html_tag(data: &[u8], tag: &[u8]) -> bool {
    if data.len() <= tag.len() {
        return false;
    }
    let prefix_matches = data
        .iter()
        .zip(tag)
        .all(|(d, t)| d.to_ascii_uppercase() == *t);

    // The tag must end at a space or '>'
    prefix_matches && matches!(data[tag.len()], b' ' | b'>')
}
