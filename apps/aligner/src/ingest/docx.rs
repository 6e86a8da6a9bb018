//! DOCX text extraction.
//!
//! A DOCX file is a zip archive; the body lives in `word/document.xml`. Each `<w:p>`
//! paragraph becomes one output line, and its run properties (bold, size), paragraph
//! style (Heading*/Title), indentation and list numbering become the line's hint.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::alignment::AlignError;
use crate::ingest::{ExtractedText, LineHint};

const DOCUMENT_PART: &str = "word/document.xml";
/// Word's default body size, 11pt, in half-points.
const DEFAULT_BODY_HALF_POINTS: u32 = 22;
/// Heading-styled paragraphs read at least this large relative to body text.
const HEADING_STYLE_RATIO: f32 = 1.25;
const TWIPS_PER_INDENT_LEVEL: u32 = 360;
const LIST_GLYPH: &str = "•";

#[derive(Debug, Default)]
struct Paragraph {
    text: String,
    bold: bool,
    half_points: Option<u32>,
    heading_style: bool,
    indent_level: u8,
}

pub fn extract_docx(bytes: &[u8]) -> Result<ExtractedText, AlignError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AlignError::CorruptDocument(format!("not a DOCX archive: {e}")))?;

    let mut xml = String::new();
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| AlignError::CorruptDocument(format!("missing {DOCUMENT_PART}: {e}")))?;
    part.read_to_string(&mut xml)
        .map_err(|e| AlignError::CorruptDocument(format!("unreadable {DOCUMENT_PART}: {e}")))?;

    let paragraphs = parse_paragraphs(&xml);
    if paragraphs.iter().all(|p| p.text.trim().is_empty()) {
        return Err(AlignError::CorruptDocument(
            "DOCX contains no text".to_string(),
        ));
    }

    let body = body_half_points(&paragraphs);
    let mut lines = Vec::with_capacity(paragraphs.len());
    let mut layout_hints = Vec::with_capacity(paragraphs.len());

    for (line_index, paragraph) in paragraphs.iter().enumerate() {
        let mut relative = paragraph.half_points.unwrap_or(body) as f32 / body as f32;
        if paragraph.heading_style {
            relative = relative.max(HEADING_STYLE_RATIO);
        }
        lines.push(paragraph.text.as_str());
        layout_hints.push(LineHint {
            line_index,
            is_bold: paragraph.bold,
            font_size_relative: relative,
            indent_level: paragraph.indent_level,
        });
    }

    Ok(ExtractedText {
        text: lines.join("\n"),
        layout_hints,
    })
}

fn parse_paragraphs(xml: &str) -> Vec<Paragraph> {
    paragraph_re()
        .captures_iter(xml)
        .map(|c| parse_paragraph(c.get(1).map_or("", |m| m.as_str())))
        .collect()
}

fn parse_paragraph(body: &str) -> Paragraph {
    let props = capture_group(paragraph_props_re(), body);
    let style = props.and_then(|p| capture_group(paragraph_style_re(), p));

    let heading_style = style.is_some_and(|s| {
        let s = s.to_ascii_lowercase();
        s.starts_with("heading") || s == "title"
    });
    let list_item = props.is_some_and(|p| p.contains("<w:numPr>"))
        || style.is_some_and(|s| s.to_ascii_lowercase().contains("list"));
    let indent_level = props
        .and_then(|p| capture_group(indent_re(), p))
        .and_then(|twips| twips.parse::<u32>().ok())
        .map_or(0, |twips| (twips / TWIPS_PER_INDENT_LEVEL).min(u8::MAX as u32) as u8);

    let mut text = String::new();
    let mut text_runs = 0usize;
    let mut all_bold = true;
    let mut half_points: Option<u32> = None;

    for run in run_re().captures_iter(body) {
        let run_body = run.get(1).map_or("", |m| m.as_str());
        let run_props = capture_group(run_props_re(), run_body).unwrap_or("");

        let mut run_text = String::new();
        for piece in run_text_re().captures_iter(run_body) {
            match piece.get(1) {
                Some(t) => run_text.push_str(&decode_entities(t.as_str())),
                // <w:tab/>, <w:br/>, <w:cr/>: one output line per paragraph, so breaks become spaces
                None => run_text.push(' '),
            }
        }

        if !run_text.trim().is_empty() {
            text_runs += 1;
            all_bold &= is_bold(run_props);
            if let Some(size) = capture_group(size_re(), run_props).and_then(|s| s.parse().ok()) {
                half_points = Some(half_points.map_or(size, |current: u32| current.max(size)));
            }
        }
        text.push_str(&run_text);
    }

    let mut text = text.trim().to_string();
    if list_item && !text.is_empty() && !text.starts_with(LIST_GLYPH) {
        text = format!("{LIST_GLYPH} {text}");
    }

    Paragraph {
        text,
        bold: text_runs > 0 && all_bold,
        half_points,
        heading_style,
        indent_level,
    }
}

/// The most common font size by character count; ties go to the smaller size.
fn body_half_points(paragraphs: &[Paragraph]) -> u32 {
    let mut weight_by_size: BTreeMap<u32, usize> = BTreeMap::new();
    for paragraph in paragraphs {
        if let Some(size) = paragraph.half_points {
            *weight_by_size.entry(size).or_default() += paragraph.text.chars().count();
        }
    }
    weight_by_size
        .into_iter()
        .filter(|(size, _)| *size > 0)
        .max_by(|(size_a, count_a), (size_b, count_b)| {
            count_a.cmp(count_b).then(size_b.cmp(size_a))
        })
        .map_or(DEFAULT_BODY_HALF_POINTS, |(size, _)| size)
}

fn is_bold(run_props: &str) -> bool {
    match bold_re().captures(run_props) {
        None => false,
        Some(c) => !matches!(
            c.get(1).map(|m| m.as_str()),
            Some("0") | Some("false") | Some("off")
        ),
    }
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    entity_re()
        .replace_all(raw, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16).ok())
                    .unwrap_or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

fn capture_group<'t>(re: &Regex, haystack: &'t str) -> Option<&'t str> {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static regex"))
        }
    };
}

cached_regex!(paragraph_re, r"(?s)<w:p(?:\s[^>]*)?(?:/>|>(.*?)</w:p>)");
cached_regex!(paragraph_props_re, r"(?s)<w:pPr>(.*?)</w:pPr>");
cached_regex!(paragraph_style_re, r#"<w:pStyle\s+w:val="([^"]+)""#);
cached_regex!(indent_re, r#"<w:ind\s[^>]*w:(?:left|start)="(\d+)""#);
cached_regex!(run_re, r"(?s)<w:r(?:\s[^>]*)?>(.*?)</w:r>");
cached_regex!(run_props_re, r"(?s)<w:rPr>(.*?)</w:rPr>");
cached_regex!(
    run_text_re,
    r"(?s)<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:(?:tab|br|cr)(?:\s[^>]*)?/>"
);
cached_regex!(bold_re, r#"<w:b(?:\s+w:val="([^"]*)")?\s*/>"#);
cached_regex!(size_re, r#"<w:sz\s+w:val="(\d+)""#);
cached_regex!(entity_re, r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);");
