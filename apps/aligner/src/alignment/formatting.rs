//! Formatting diagnostics — layout inconsistencies an applicant-tracking system or a
//! screener trips over, plus an ATS-style score that folds them together with section
//! coverage and keyword coverage.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::alignment::models::{GapReport, SectionLabel};
use crate::alignment::segmenter::strip_bullet;

/// Points deducted per formatting issue and per missing canonical section.
const ISSUE_PENALTY: f32 = 5.0;
const MISSING_SECTION_PENALTY: f32 = 3.0;
/// Share of the score that keyword coverage can scale away.
const KEYWORD_SHARE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateStyle {
    /// "Jan 2021", "September 2019"
    MonthName,
    /// "01/2021"
    NumericMonth,
    /// "2021"
    YearOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum FormattingIssue {
    InconsistentBulletGlyphs { glyphs: Vec<char> },
    InconsistentDateFormats { styles: Vec<DateStyle> },
}

/// Scans extracted resume text. Numbered items are lists of their own and are not
/// compared against glyph bullets.
pub fn analyze(text: &str) -> Vec<FormattingIssue> {
    let mut issues = Vec::new();

    let glyphs: BTreeSet<char> = text
        .lines()
        .map(str::trim)
        .filter(|line| strip_bullet(line).is_some())
        .filter_map(|line| line.chars().next())
        .filter(|c| !c.is_ascii_digit())
        .collect();
    if glyphs.len() > 1 {
        issues.push(FormattingIssue::InconsistentBulletGlyphs {
            glyphs: glyphs.into_iter().collect(),
        });
    }

    let styles = date_styles(text);
    if styles.len() > 1 {
        issues.push(FormattingIssue::InconsistentDateFormats {
            styles: styles.into_iter().collect(),
        });
    }

    issues
}

/// 0–100. Starts at 100, loses points per formatting issue and missing section, then
/// scales by keyword coverage (matched / all requirements; full coverage when the
/// posting has none).
pub fn ats_score(
    issues: &[FormattingIssue],
    missing_sections: &[SectionLabel],
    gap_report: &GapReport,
) -> f32 {
    let base = 100.0
        - ISSUE_PENALTY * issues.len() as f32
        - MISSING_SECTION_PENALTY * missing_sections.len() as f32;

    let total = gap_report.requirement_count();
    let coverage = if total == 0 {
        1.0
    } else {
        gap_report.matched.len() as f32 / total as f32
    };

    (base * (1.0 - KEYWORD_SHARE + KEYWORD_SHARE * coverage)).clamp(0.0, 100.0)
}

fn date_styles(text: &str) -> BTreeSet<DateStyle> {
    date_re()
        .captures_iter(text)
        .filter_map(|c| {
            if c.name("month_name").is_some() {
                Some(DateStyle::MonthName)
            } else if c.name("numeric").is_some() {
                Some(DateStyle::NumericMonth)
            } else if c.name("year").is_some() {
                Some(DateStyle::YearOnly)
            } else {
                None
            }
        })
        .collect()
}

/// Leftmost-first alternation: a year inside "Jan 2021" or "01/2021" is not counted again.
fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?P<month_name>\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+(?:19|20)\d{2}\b)|(?P<numeric>\b(?:0?[1-9]|1[0-2])/(?:19|20)\d{2}\b)|(?P<year>\b(?:19|20)\d{2}\b)",
        )
        .expect("static regex")
    })
}
