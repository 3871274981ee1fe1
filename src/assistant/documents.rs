//! Document text extraction (PDF, DOCX, TXT).

use std::io::{Cursor, Read};

use zip::ZipArchive;

#[derive(Debug)]
pub enum DocumentError {
    /// File extension we do not handle.
    Unsupported(String),
    /// The document parsed but contained no text.
    Empty,
    /// The document could not be parsed.
    Extraction(String),
}

impl std::fmt::Display for DocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentError::Unsupported(ext) => write!(f, "unsupported document type: .{ext}"),
            DocumentError::Empty => write!(f, "document contains no text"),
            DocumentError::Extraction(e) => write!(f, "extraction failed: {e}"),
        }
    }
}

impl std::error::Error for DocumentError {}

/// Extract plain text from a document, dispatching on the file extension.
pub fn extract_text(file_name: &str, data: &[u8]) -> Result<String, DocumentError> {
    let name = file_name.to_lowercase();
    let text = if name.ends_with(".pdf") {
        pdf_extract::extract_text_from_mem(data)
            .map_err(|e| DocumentError::Extraction(format!("PDF: {e}")))?
    } else if name.ends_with(".docx") {
        extract_docx(data)?
    } else if name.ends_with(".txt") {
        String::from_utf8_lossy(data).into_owned()
    } else {
        let ext = name.rsplit('.').next().unwrap_or("").to_string();
        return Err(DocumentError::Unsupported(ext));
    };

    if text.trim().is_empty() {
        return Err(DocumentError::Empty);
    }
    Ok(text)
}

/// DOCX files are ZIP archives; the body text lives in `<w:t>` elements of
/// word/document.xml.
fn extract_docx(data: &[u8]) -> Result<String, DocumentError> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| DocumentError::Extraction(format!("DOCX is not a valid ZIP: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| DocumentError::Extraction("DOCX: missing word/document.xml".to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| DocumentError::Extraction(format!("DOCX: {e}")))?;

    Ok(document_xml_text(&xml))
}

/// Collect the text of every `<w:t>` element, with paragraph and line
/// breaks preserved as newlines.
fn document_xml_text(xml: &str) -> String {
    let mut out = String::new();
    let mut rest = xml;

    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else { break };
        let tag = &rest[start + 1..start + len];
        let after_tag = &rest[start + len + 1..];

        match tag {
            "/w:p" | "w:br" | "w:br/" => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                rest = after_tag;
            }
            t if t == "w:t" || t.starts_with("w:t ") => {
                if let Some(close) = after_tag.find("</w:t>") {
                    push_decoded(&mut out, &after_tag[..close]);
                    rest = &after_tag[close + "</w:t>".len()..];
                } else {
                    rest = after_tag;
                }
            }
            _ => rest = after_tag,
        }
    }

    out.trim_end().to_string()
}

/// Decode the XML entities Word emits in text runs.
fn push_decoded(out: &mut String, s: &str) {
    if !s.contains('&') {
        out.push_str(s);
        return;
    }
    // &amp; last so freshly decoded entities are not re-decoded
    let decoded = s
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");
    out.push_str(&decoded);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docx_xml_simple() {
        let xml = r"<w:document><w:body><w:p><w:r><w:t>Hello World</w:t></w:r></w:p></w:body></w:document>";
        assert_eq!(document_xml_text(xml), "Hello World");
    }

    #[test]
    fn test_docx_xml_paragraphs() {
        let xml = r"<w:p><w:r><w:t>First</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t></w:r></w:p>";
        assert_eq!(document_xml_text(xml), "First\nSecond");
    }

    #[test]
    fn test_docx_xml_entities() {
        let xml = r"<w:p><w:r><w:t>A &lt; B &amp; C &gt; D</w:t></w:r></w:p>";
        assert_eq!(document_xml_text(xml), "A < B & C > D");
    }

    #[test]
    fn test_docx_xml_attributed_text_run() {
        let xml = r#"<w:p><w:r><w:t xml:space="preserve"> spaced </w:t></w:r></w:p>"#;
        assert_eq!(document_xml_text(xml), " spaced");
    }

    #[test]
    fn test_docx_xml_line_break() {
        let xml = r"<w:p><w:r><w:t>one</w:t><w:br/><w:t>two</w:t></w:r></w:p>";
        assert_eq!(document_xml_text(xml), "one\ntwo");
    }

    #[test]
    fn test_txt_passthrough() {
        let text = extract_text("notes.txt", "plain text".as_bytes()).unwrap();
        assert_eq!(text, "plain text");
    }

    #[test]
    fn test_unsupported_extension() {
        let err = extract_text("archive.rar", b"data").unwrap_err();
        assert!(matches!(err, DocumentError::Unsupported(ext) if ext == "rar"));
    }

    #[test]
    fn test_empty_txt_rejected() {
        let err = extract_text("blank.txt", b"   \n ").unwrap_err();
        assert!(matches!(err, DocumentError::Empty));
    }

    #[test]
    fn test_garbage_pdf_rejected() {
        let err = extract_text("broken.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, DocumentError::Extraction(_)));
    }

    #[test]
    fn test_garbage_docx_rejected() {
        let err = extract_text("broken.docx", b"not a zip").unwrap_err();
        assert!(matches!(err, DocumentError::Extraction(_)));
    }
}
