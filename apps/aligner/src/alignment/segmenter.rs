//! Section Segmenter — splits extracted resume text into labeled sections.
//!
//! A line opens a new section when it matches the heading vocabulary (exact or fuzzy)
//! or when its layout hint reads as a heading (bold or larger font, and short).
//! Heading detection is a pure function over the line and its `LineHint`, so it is
//! testable without any PDF/DOCX parser.

use std::collections::HashMap;

use strsim::jaro_winkler;
use tracing::debug;

use crate::alignment::config::AlignmentConfig;
use crate::alignment::models::{ResumeSection, SectionLabel};
use crate::alignment::AlignError;
use crate::ingest::LineHint;

/// Fuzzy vocabulary matching only applies to lines this short.
const FUZZY_MAX_TOKENS: usize = 4;
const FUZZY_MIN_CHARS: usize = 4;

/// Splits `text` into ordered sections. No line of content is dropped: text before the
/// first heading becomes an `Other` section, and unrecognized layout headings open
/// `Other` sections.
pub fn segment(
    text: &str,
    layout_hints: &[LineHint],
    config: &AlignmentConfig,
) -> Result<Vec<ResumeSection>, AlignError> {
    if text.trim().is_empty() {
        return Err(AlignError::EmptyDocument);
    }

    let hints: HashMap<usize, &LineHint> =
        layout_hints.iter().map(|h| (h.line_index, h)).collect();

    let mut sections: Vec<ResumeSection> = Vec::new();
    let mut current: Option<ResumeSection> = None;

    for (line_index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(label) = classify_heading(line, hints.get(&line_index).copied(), config) {
            if let Some(done) = current.take() {
                sections.push(done);
            }
            current = Some(ResumeSection::new(
                label,
                Some(line.to_string()),
                sections.len(),
            ));
            continue;
        }

        if let Some((label, heading, rest)) = split_inline_heading(line, config) {
            if let Some(done) = current.take() {
                sections.push(done);
            }
            let mut section = ResumeSection::new(label, Some(heading.to_string()), sections.len());
            append_line(&mut section, rest);
            current = Some(section);
            continue;
        }

        let ordinal = sections.len();
        let section = current
            .get_or_insert_with(|| ResumeSection::new(SectionLabel::Other, None, ordinal));
        append_line(section, line);
    }

    if let Some(done) = current {
        sections.push(done);
    }

    debug!(
        "Segmented resume into {} sections: {:?}",
        sections.len(),
        sections.iter().map(|s| s.label).collect::<Vec<_>>()
    );
    Ok(sections)
}

/// Decides whether a trimmed line is a heading, and if so which label it opens.
///
/// A vocabulary match wins over the layout heuristic on the same line.
pub fn classify_heading(
    line: &str,
    hint: Option<&LineHint>,
    config: &AlignmentConfig,
) -> Option<SectionLabel> {
    if strip_bullet(line).is_some() {
        return None;
    }
    if let Some(label) = vocabulary_label(line, config) {
        return Some(label);
    }
    if is_layout_heading(line, hint, config) {
        return Some(SectionLabel::Other);
    }
    None
}

/// Case-insensitive exact lookup, then Jaro–Winkler fuzzy lookup for short lines.
pub fn vocabulary_label(line: &str, config: &AlignmentConfig) -> Option<SectionLabel> {
    let normalized = normalize_heading(line);
    if normalized.is_empty() {
        return None;
    }
    if let Some(label) = config.heading_vocabulary.get(&normalized) {
        return Some(*label);
    }

    let tokens = normalized.split_whitespace().count();
    if tokens > FUZZY_MAX_TOKENS || normalized.chars().count() < FUZZY_MIN_CHARS {
        return None;
    }

    // BTreeMap order keeps ties deterministic: the first phrase with the best score wins.
    let mut best: Option<(f64, SectionLabel)> = None;
    for (phrase, label) in &config.heading_vocabulary {
        let similarity = jaro_winkler(&normalized, phrase);
        if similarity >= config.heading_similarity
            && best.map_or(true, |(score, _)| similarity > score)
        {
            best = Some((similarity, *label));
        }
    }
    best.map(|(_, label)| label)
}

/// Splits "Skills: Python, SQL" into its vocabulary heading and the content after the colon.
pub fn split_inline_heading<'a>(
    line: &'a str,
    config: &AlignmentConfig,
) -> Option<(SectionLabel, &'a str, &'a str)> {
    if strip_bullet(line).is_some() {
        return None;
    }
    let (head, rest) = line.split_once(':')?;
    let (head, rest) = (head.trim(), rest.trim());
    if head.is_empty() || rest.is_empty() || head.split_whitespace().count() > FUZZY_MAX_TOKENS {
        return None;
    }
    vocabulary_label(head, config).map(|label| (label, head, rest))
}

fn is_layout_heading(line: &str, hint: Option<&LineHint>, config: &AlignmentConfig) -> bool {
    let Some(hint) = hint else {
        return false;
    };
    let emphasized = hint.is_bold || hint.font_size_relative >= config.layout_font_ratio;
    emphasized && line.split_whitespace().count() < config.layout_heading_max_tokens
}

/// Lowercases, drops decoration around the words ("— SKILLS:", "Experience |"),
/// and collapses whitespace.
fn normalize_heading(line: &str) -> String {
    let trimmed = line.trim_matches(|c: char| !c.is_alphanumeric());
    trimmed
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn append_line(section: &mut ResumeSection, line: &str) {
    if !section.raw_text.is_empty() {
        section.raw_text.push('\n');
    }
    section.raw_text.push_str(line);
    if let Some(bullet) = strip_bullet(line) {
        section.bullet_points.push(bullet.to_string());
    }
}

/// Returns the bullet text without its glyph, if the line starts with one
/// (`-`, `–`, `•`, `*`, `◦`, `▪`, `‣`, or digits followed by a period).
///
/// Dashes need trailing whitespace so "-10% churn" stays text; the other glyphs may sit
/// directly against the text ("•Built APIs", "1.Shipped v2").
pub fn strip_bullet(line: &str) -> Option<&str> {
    const DASHES: &[char] = &['-', '–'];
    const GLYPHS: &[char] = &['•', '*', '◦', '▪', '‣'];

    let mut chars = line.chars();
    let first = chars.next()?;
    let rest = if DASHES.contains(&first) {
        let rest = chars.as_str();
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        rest
    } else if GLYPHS.contains(&first) {
        chars.as_str()
    } else if first.is_ascii_digit() {
        let digits_end = line
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(line.len());
        let rest = line[digits_end..].strip_prefix('.')?;
        // "2.5 years" is a decimal, not a numbered item.
        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        rest
    } else {
        return None;
    };

    let text = rest.trim();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AlignmentConfig {
        AlignmentConfig::default()
    }

    fn bold(line_index: usize) -> LineHint {
        LineHint {
            line_index,
            is_bold: true,
            font_size_relative: 1.0,
            indent_level: 0,
        }
    }

    const RESUME: &str = "Jane Doe\njane@example.com\n\nSUMMARY\nBackend engineer.\n\nWork Experience:\nAcme Corp — Senior Engineer\n- Built billing APIs in Rust\n• Cut p99 latency by 40%\n\nSkills\nPython, SQL\n";

    #[test]
    fn test_segments_vocabulary_headings() {
        let sections = segment(RESUME, &[], &config()).unwrap();
        let labels: Vec<_> = sections.iter().map(|s| s.label).collect();
        assert_eq!(
            labels,
            vec![
                SectionLabel::Other,
                SectionLabel::Summary,
                SectionLabel::Experience,
                SectionLabel::Skills
            ]
        );

        let preamble = &sections[0];
        assert_eq!(preamble.heading, None);
        assert_eq!(preamble.raw_text, "Jane Doe\njane@example.com");

        let experience = &sections[2];
        assert_eq!(experience.heading.as_deref(), Some("Work Experience:"));
        assert_eq!(
            experience.bullet_points,
            vec!["Built billing APIs in Rust", "Cut p99 latency by 40%"]
        );
        assert!(experience.raw_text.starts_with("Acme Corp"));

        for (i, section) in sections.iter().enumerate() {
            assert_eq!(section.ordinal_position, i);
        }
    }

    #[test]
    fn test_no_content_is_dropped() {
        let sections = segment(RESUME, &[], &config()).unwrap();
        let kept: usize = sections
            .iter()
            .map(|s| s.raw_text.lines().count() + usize::from(s.heading.is_some()))
            .sum();
        let non_empty = RESUME.lines().filter(|l| !l.trim().is_empty()).count();
        assert_eq!(kept, non_empty);
    }

    #[test]
    fn test_segmentation_is_idempotent() {
        let hints = vec![bold(0)];
        let first = segment(RESUME, &hints, &config()).unwrap();
        let second = segment(RESUME, &hints, &config()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_layout_heading_opens_other_section() {
        let text = "Summary\nBackend engineer.\nOpen Source Work\nMaintainer of a CLI\n";
        let hints = vec![bold(2)];
        let sections = segment(text, &hints, &config()).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].label, SectionLabel::Other);
        assert_eq!(sections[1].heading.as_deref(), Some("Open Source Work"));
        assert_eq!(sections[1].raw_text, "Maintainer of a CLI");
    }

    #[test]
    fn test_vocabulary_beats_layout_on_same_line() {
        let hint = bold(0);
        assert_eq!(
            classify_heading("Education", Some(&hint), &config()),
            Some(SectionLabel::Education)
        );
    }

    #[test]
    fn test_long_bold_line_is_not_a_heading() {
        let hint = LineHint {
            line_index: 0,
            is_bold: false,
            font_size_relative: 1.4,
            indent_level: 0,
        };
        assert_eq!(
            classify_heading("Led a team of six engineers across two sites", Some(&hint), &config()),
            None
        );
        assert_eq!(
            classify_heading("Jane Doe", Some(&hint), &config()),
            Some(SectionLabel::Other)
        );
    }

    #[test]
    fn test_fuzzy_heading_match() {
        assert_eq!(vocabulary_label("Experiences", &config()), Some(SectionLabel::Experience));
        assert_eq!(vocabulary_label("PROJECT", &config()), Some(SectionLabel::Projects));
        assert_eq!(vocabulary_label("Skilled", &config()), None);
        assert_eq!(vocabulary_label("Python", &config()), None);
    }

    #[test]
    fn test_heading_decoration_is_ignored() {
        assert_eq!(vocabulary_label("— SKILLS —", &config()), Some(SectionLabel::Skills));
        assert_eq!(vocabulary_label("Education:", &config()), Some(SectionLabel::Education));
    }

    #[test]
    fn test_bullet_lines_are_never_headings() {
        assert_eq!(classify_heading("- Skills", None, &config()), None);
    }

    #[test]
    fn test_strip_bullet_variants() {
        assert_eq!(strip_bullet("- Built APIs"), Some("Built APIs"));
        assert_eq!(strip_bullet("•  Shipped v2"), Some("Shipped v2"));
        assert_eq!(strip_bullet("* Mentored"), Some("Mentored"));
        assert_eq!(strip_bullet("12. Wrote docs"), Some("Wrote docs"));
        assert_eq!(strip_bullet("2024 Acme"), None);
        assert_eq!(strip_bullet("-10% churn"), None);
        assert_eq!(strip_bullet("Plain line"), None);
        assert_eq!(strip_bullet("-"), None);
        assert_eq!(strip_bullet("2.5 years of Go"), None);
    }

    #[test]
    fn test_glyphs_without_space_are_bullets() {
        let text = "Experience\n•Built billing APIs in Rust\n*Led a team of 4\n1.Shipped v2\n- Spaced bullet\n-10% churn\n";
        let sections = segment(text, &[], &config()).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(
            sections[0].bullet_points,
            vec![
                "Built billing APIs in Rust",
                "Led a team of 4",
                "Shipped v2",
                "Spaced bullet"
            ]
        );
        assert!(sections[0].raw_text.ends_with("-10% churn"));
    }

    #[test]
    fn test_inline_heading_opens_section() {
        let text = "Summary\nBackend engineer.\nSkills: Python, SQL, Docker\nEducation\nBSc\n";
        let sections = segment(text, &[], &config()).unwrap();
        let labels: Vec<_> = sections.iter().map(|s| s.label).collect();
        assert_eq!(
            labels,
            vec![SectionLabel::Summary, SectionLabel::Skills, SectionLabel::Education]
        );
        assert_eq!(sections[1].heading.as_deref(), Some("Skills"));
        assert_eq!(sections[1].raw_text, "Python, SQL, Docker");
        assert_eq!(sections[0].raw_text, "Backend engineer.");
    }

    #[test]
    fn test_colon_lines_outside_vocabulary_stay_content() {
        assert_eq!(split_inline_heading("Stack: Rust, Go", &config()), None);
        assert_eq!(split_inline_heading("Skills:", &config()), None);
        assert_eq!(split_inline_heading("- Skills: Rust", &config()), None);
    }

    #[test]
    fn test_empty_text_fails() {
        let err = segment("  \n\t\n", &[], &config()).unwrap_err();
        assert!(matches!(err, AlignError::EmptyDocument));
    }

    #[test]
    fn test_heading_without_content_is_kept() {
        let sections = segment("Skills\nEducation\nBSc Computer Science", &[], &config()).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].label, SectionLabel::Skills);
        assert!(sections[0].raw_text.is_empty());
    }
}
