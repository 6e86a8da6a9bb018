//! Data model shared by the segmenter, requirement extractor, matcher and suggestion assembler.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Resume side
// ────────────────────────────────────────────────────────────────────────────

/// Canonical resume section label. Labels are not unique within a resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectionLabel {
    Summary,
    Experience,
    Education,
    Skills,
    Projects,
    Other,
}

impl SectionLabel {
    /// Sections a complete resume is expected to carry.
    pub const CANONICAL: [SectionLabel; 5] = [
        SectionLabel::Summary,
        SectionLabel::Experience,
        SectionLabel::Education,
        SectionLabel::Skills,
        SectionLabel::Projects,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionLabel::Summary => "Summary",
            SectionLabel::Experience => "Experience",
            SectionLabel::Education => "Education",
            SectionLabel::Skills => "Skills",
            SectionLabel::Projects => "Projects",
            SectionLabel::Other => "Other",
        }
    }
}

impl fmt::Display for SectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labeled block of resume text produced by the segmenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeSection {
    pub label: SectionLabel,
    /// Literal heading line that opened the section. `None` for text before the first heading.
    pub heading: Option<String>,
    pub raw_text: String,
    pub ordinal_position: usize,
    /// Bullet lines with their glyph stripped, in document order.
    pub bullet_points: Vec<String>,
}

impl ResumeSection {
    pub fn new(label: SectionLabel, heading: Option<String>, ordinal_position: usize) -> Self {
        Self {
            label,
            heading,
            raw_text: String::new(),
            ordinal_position,
            bullet_points: Vec::new(),
        }
    }

    /// Matching evidence: bullet points when present (denser skill evidence), else raw text.
    pub fn evidence_text(&self) -> String {
        if self.bullet_points.is_empty() {
            self.raw_text.clone()
        } else {
            self.bullet_points.join("\n")
        }
    }

    /// Short human-readable name used in rationales and prompts.
    pub fn display_name(&self) -> String {
        match &self.heading {
            Some(heading) if self.label == SectionLabel::Other => heading.clone(),
            _ => self.label.to_string(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Job side
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RequirementKind {
    RequiredSkill,
    PreferredSkill,
    Qualification,
    Responsibility,
}

impl RequirementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementKind::RequiredSkill => "required skill",
            RequirementKind::PreferredSkill => "preferred skill",
            RequirementKind::Qualification => "qualification",
            RequirementKind::Responsibility => "responsibility",
        }
    }
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single requirement extracted from a job description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequirement {
    pub text: String,
    pub kind: RequirementKind,
    /// Extraction confidence / emphasis, 0.0 – 1.0.
    pub weight: f32,
}

/// Identity of a requirement: normalized text plus kind.
pub type RequirementKey = (String, RequirementKind);

impl JobRequirement {
    pub fn new(text: impl Into<String>, kind: RequirementKind, weight: f32) -> Self {
        Self {
            text: text.into(),
            kind,
            weight: weight.clamp(0.0, 1.0),
        }
    }

    pub fn key(&self) -> RequirementKey {
        (normalize_text(&self.text), self.kind)
    }
}

/// Lowercases and collapses runs of whitespace.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

// ────────────────────────────────────────────────────────────────────────────
// Matching output
// ────────────────────────────────────────────────────────────────────────────

/// Similarity between one resume section and one requirement. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityScore<'a> {
    pub section: &'a ResumeSection,
    pub requirement: &'a JobRequirement,
    pub score: f32,
}

/// A requirement whose best section reached the match threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementMatch {
    pub requirement: JobRequirement,
    pub section: ResumeSection,
    pub score: f32,
}

/// Best section for a requirement, whether or not it reached the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateMatch {
    pub section_ordinal: usize,
    pub score: f32,
}

/// Best requirement score for a single bullet point.
#[derive(Debug, Clone, PartialEq)]
pub struct BulletScore {
    pub section_ordinal: usize,
    pub bullet_index: usize,
    pub text: String,
    pub score: f32,
}

/// Per-pass similarity evidence kept alongside a gap report for the suggestion assembler.
/// Not serialized: a report read back from storage carries empty evidence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchEvidence {
    pub requirement_best: HashMap<RequirementKey, CandidateMatch>,
    pub section_best: BTreeMap<usize, f32>,
    pub bullets: Vec<BulletScore>,
}

impl MatchEvidence {
    pub fn best_for(&self, requirement: &JobRequirement) -> Option<CandidateMatch> {
        self.requirement_best.get(&requirement.key()).copied()
    }

    pub fn section_score(&self, ordinal: usize) -> f32 {
        self.section_best.get(&ordinal).copied().unwrap_or(0.0)
    }
}

/// Matched / missing breakdown of job requirements against resume content.
///
/// Every requirement appears in exactly one of `matched` / `missing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    /// Ordered by descending score.
    pub matched: Vec<RequirementMatch>,
    /// Ordered by descending weight, then alphabetically by text.
    pub missing: Vec<JobRequirement>,
    /// Σ(score × weight over matched) / Σ(weight over all requirements).
    pub overall_score: f32,
    pub threshold: f32,
    #[serde(skip)]
    pub evidence: MatchEvidence,
}

impl GapReport {
    pub fn empty(threshold: f32) -> Self {
        Self {
            matched: Vec::new(),
            missing: Vec::new(),
            overall_score: 0.0,
            threshold,
            evidence: MatchEvidence::default(),
        }
    }

    pub fn requirement_count(&self) -> usize {
        self.matched.len() + self.missing.len()
    }

    #[cfg(test)]
    pub fn is_matched(&self, requirement: &JobRequirement) -> bool {
        let key = requirement.key();
        self.matched.iter().any(|m| m.requirement.key() == key)
    }

    #[cfg(test)]
    pub fn is_missing(&self, requirement: &JobRequirement) -> bool {
        let key = requirement.key();
        self.missing.iter().any(|r| r.key() == key)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Suggestions
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuggestionIssue {
    MissingSkill,
    WeakBullet,
    GenericSummary,
}

impl SuggestionIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionIssue::MissingSkill => "missing_skill",
            SuggestionIssue::WeakBullet => "weak_bullet",
            SuggestionIssue::GenericSummary => "generic_summary",
        }
    }
}

/// Text proposed by the generative-text collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum ProposedText {
    Pending,
    Ready(String),
}

/// A suggestion request, later filled with proposed text. Immutable once filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailoringSuggestion {
    /// Deterministic request id, stable across runs for the same input.
    pub id: Uuid,
    /// `None` means new content (e.g. a summary the resume does not have yet).
    pub target_section: Option<ResumeSection>,
    pub issue: SuggestionIssue,
    pub rationale: String,
    /// The offending bullet for `WeakBullet` suggestions.
    pub bullet: Option<String>,
    pub prompt: String,
    pub context: BTreeMap<String, String>,
    pub proposed_text: ProposedText,
}

impl TailoringSuggestion {
    pub fn is_pending(&self) -> bool {
        matches!(self.proposed_text, ProposedText::Pending)
    }
}
