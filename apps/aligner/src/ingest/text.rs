use crate::alignment::AlignError;
use crate::ingest::{plain_hints, ExtractedText};

const BOM: char = '\u{feff}';

/// Decodes a plain-text resume. Empty input is not an error here; the segmenter
/// reports it as `EmptyDocument`.
pub fn extract_plain(bytes: &[u8]) -> Result<ExtractedText, AlignError> {
    let decoded = std::str::from_utf8(bytes)
        .map_err(|e| AlignError::CorruptDocument(format!("text is not valid UTF-8: {e}")))?;

    let text = decoded
        .trim_start_matches(BOM)
        .replace("\r\n", "\n")
        .replace('\r', "\n");
    let layout_hints = plain_hints(&text);

    Ok(ExtractedText { text, layout_hints })
}
