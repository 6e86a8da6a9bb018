//! Document text extraction — turns raw resume bytes into a flat text stream plus
//! per-line layout hints that the segmenter reads as heading signals.

use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alignment::AlignError;

pub mod docx;
pub mod pdf;
pub mod text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Text,
}

impl DocumentFormat {
    /// Infers the format from a file name's extension.
    pub fn from_filename(name: &str) -> Result<Self, AlignError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| AlignError::UnsupportedFormat(format!("'{name}' has no extension")))?;
        extension.parse()
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::Text => "text/plain; charset=utf-8",
        }
    }
}

impl FromStr for DocumentFormat {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "pdf" | "application/pdf" => Ok(DocumentFormat::Pdf),
            "docx"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Ok(DocumentFormat::Docx)
            }
            "text" | "txt" | "text/plain" => Ok(DocumentFormat::Text),
            other => Err(AlignError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Raw resume bytes and their declared format. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    content: Bytes,
    format: DocumentFormat,
}

impl ResumeDocument {
    pub fn new(content: impl Into<Bytes>, format: DocumentFormat) -> Self {
        Self {
            content: content.into(),
            format,
        }
    }

    /// Builds a document from a caller-declared format string ("pdf", "docx", "text").
    pub fn from_declared(content: impl Into<Bytes>, declared: &str) -> Result<Self, AlignError> {
        Ok(Self::new(content, declared.parse()?))
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }
}

/// Layout signal for one line of extracted text.
///
/// Formats without layout information report `is_bold = false` and
/// `font_size_relative = 1.0` (body size).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineHint {
    pub line_index: usize,
    pub is_bold: bool,
    /// Font size relative to the document's body text.
    pub font_size_relative: f32,
    pub indent_level: u8,
}

impl LineHint {
    pub fn plain(line_index: usize, indent_level: u8) -> Self {
        Self {
            line_index,
            is_bold: false,
            font_size_relative: 1.0,
            indent_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub layout_hints: Vec<LineHint>,
}

/// Extracts text and layout hints. Pure transform; never touches storage.
pub fn extract(document: &ResumeDocument) -> Result<ExtractedText, AlignError> {
    let extracted = match document.format() {
        DocumentFormat::Pdf => pdf::extract_pdf(document.content())?,
        DocumentFormat::Docx => docx::extract_docx(document.content())?,
        DocumentFormat::Text => text::extract_plain(document.content())?,
    };
    debug!(
        "Extracted {} chars, {} lines from {:?} document",
        extracted.text.len(),
        extracted.layout_hints.len(),
        document.format()
    );
    Ok(extracted)
}

/// Hints for text that carries no font information: only indentation is known.
pub(crate) fn plain_hints(text: &str) -> Vec<LineHint> {
    text.lines()
        .enumerate()
        .map(|(index, line)| LineHint::plain(index, indent_level(line)))
        .collect()
}

fn indent_level(line: &str) -> u8 {
    let width: usize = line
        .chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum();
    (width / 2).min(u8::MAX as usize) as u8
}
