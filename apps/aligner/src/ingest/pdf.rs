//! PDF text extraction via `pdf-extract`.
//!
//! pdf-extract exposes no font information, so hints only carry indentation.
//! Reading order follows the content stream, which is reliable within a single column.

use std::panic;

use tracing::warn;

use crate::alignment::AlignError;
use crate::ingest::{plain_hints, ExtractedText};

const PDF_MAGIC: &[u8] = b"%PDF-";
/// The header may be preceded by junk bytes, but only within the first KiB.
const MAGIC_SEARCH_WINDOW: usize = 1024;

pub fn extract_pdf(bytes: &[u8]) -> Result<ExtractedText, AlignError> {
    let window = &bytes[..bytes.len().min(MAGIC_SEARCH_WINDOW)];
    if !window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
        return Err(AlignError::CorruptDocument(
            "missing %PDF- header".to_string(),
        ));
    }

    // pdf-extract panics on some malformed inputs instead of returning an error.
    let raw = match panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            return Err(AlignError::CorruptDocument(format!("PDF parse failed: {e}")));
        }
        Err(_) => {
            warn!("pdf-extract panicked while parsing a {}-byte document", bytes.len());
            return Err(AlignError::CorruptDocument(
                "PDF parser could not recover from malformed input".to_string(),
            ));
        }
    };

    let text = normalize_pdf_text(&raw);
    if text.trim().is_empty() {
        return Err(AlignError::CorruptDocument(
            "no extractable text (scanned or image-only PDF?)".to_string(),
        ));
    }

    let layout_hints = plain_hints(&text);
    Ok(ExtractedText { text, layout_hints })
}

/// Drops form feeds and trailing whitespace, and collapses the runs of blank lines
/// pdf-extract emits between text blocks.
fn normalize_pdf_text(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = true;
    for line in raw.split(['\n', '\x0c']) {
        let line = line.trim_end();
        let blank = line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        lines.push(if blank { "" } else { line });
        previous_blank = blank;
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_header_is_corrupt() {
        let err = extract_pdf(b"PK\x03\x04 definitely a zip").unwrap_err();
        assert!(matches!(err, AlignError::CorruptDocument(msg) if msg.contains("header")));
    }

    #[test]
    fn test_truncated_pdf_is_corrupt() {
        let err = extract_pdf(b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog").unwrap_err();
        assert!(matches!(err, AlignError::CorruptDocument(_)));
    }

    #[test]
    fn test_normalize_collapses_blank_runs() {
        let raw = "\n\nJane Doe\n\n\n\nExperience   \n\x0cAcme Corp\n\n";
        assert_eq!(normalize_pdf_text(raw), "Jane Doe\n\nExperience\n\nAcme Corp");
    }
}
