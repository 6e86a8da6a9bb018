//! Product-tuning parameters for the alignment engine.
//!
//! Every field has a default; a JSON file may override any subset of them.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::alignment::models::{RequirementKind, SectionLabel};

/// Base weight per requirement kind, before the repetition boost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindWeights {
    pub required: f32,
    pub qualification: f32,
    pub responsibility: f32,
    pub preferred: f32,
}

impl Default for KindWeights {
    fn default() -> Self {
        Self {
            required: 1.0,
            qualification: 0.8,
            responsibility: 0.6,
            preferred: 0.5,
        }
    }
}

impl KindWeights {
    pub fn for_kind(&self, kind: RequirementKind) -> f32 {
        match kind {
            RequirementKind::RequiredSkill => self.required,
            RequirementKind::Qualification => self.qualification,
            RequirementKind::Responsibility => self.responsibility,
            RequirementKind::PreferredSkill => self.preferred,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Minimum best-section similarity for a requirement to count as matched.
    pub match_threshold: f32,
    /// A missing requirement only targets a section scoring above this floor.
    pub suggestion_floor: f32,
    /// Jaro–Winkler similarity needed for a fuzzy heading-vocabulary hit.
    pub heading_similarity: f64,
    /// Relative font size at or above which a short line reads as a heading.
    pub layout_font_ratio: f32,
    /// Layout headings must have fewer tokens than this.
    pub layout_heading_max_tokens: usize,
    /// Dimension `D` every embedding must have.
    pub embedding_dimension: usize,
    pub kind_weights: KindWeights,
    /// Added to a requirement's weight when its phrase recurs in the job text.
    pub repetition_boost: f32,
    /// Normalized heading phrase → section label.
    pub heading_vocabulary: BTreeMap<String, SectionLabel>,
    /// Known skill / technology phrases, matched case-insensitively on word boundaries.
    pub skill_dictionary: Vec<String>,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.55,
            suggestion_floor: 0.2,
            heading_similarity: 0.92,
            layout_font_ratio: 1.15,
            layout_heading_max_tokens: 6,
            embedding_dimension: 512,
            kind_weights: KindWeights::default(),
            repetition_boost: 0.1,
            heading_vocabulary: default_heading_vocabulary(),
            skill_dictionary: DEFAULT_SKILLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AlignmentConfig {
    /// Loads a JSON override file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read alignment config {}", path.display()))?;
        let config: AlignmentConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid alignment config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.match_threshold),
            "match_threshold must be within [0, 1], got {}",
            self.match_threshold
        );
        ensure!(
            (0.0..=1.0).contains(&self.suggestion_floor),
            "suggestion_floor must be within [0, 1], got {}",
            self.suggestion_floor
        );
        ensure!(
            (0.0..=1.0).contains(&self.heading_similarity),
            "heading_similarity must be within [0, 1], got {}",
            self.heading_similarity
        );
        ensure!(self.embedding_dimension > 0, "embedding_dimension must be positive");
        ensure!(
            self.layout_heading_max_tokens > 0,
            "layout_heading_max_tokens must be positive"
        );
        Ok(())
    }
}

fn default_heading_vocabulary() -> BTreeMap<String, SectionLabel> {
    const ENTRIES: &[(&str, SectionLabel)] = &[
        ("summary", SectionLabel::Summary),
        ("professional summary", SectionLabel::Summary),
        ("career summary", SectionLabel::Summary),
        ("summary of qualifications", SectionLabel::Summary),
        ("profile", SectionLabel::Summary),
        ("professional profile", SectionLabel::Summary),
        ("objective", SectionLabel::Summary),
        ("career objective", SectionLabel::Summary),
        ("about me", SectionLabel::Summary),
        ("experience", SectionLabel::Experience),
        ("work experience", SectionLabel::Experience),
        ("professional experience", SectionLabel::Experience),
        ("relevant experience", SectionLabel::Experience),
        ("work history", SectionLabel::Experience),
        ("employment", SectionLabel::Experience),
        ("employment history", SectionLabel::Experience),
        ("career history", SectionLabel::Experience),
        ("education", SectionLabel::Education),
        ("academic background", SectionLabel::Education),
        ("education and training", SectionLabel::Education),
        ("skills", SectionLabel::Skills),
        ("technical skills", SectionLabel::Skills),
        ("core skills", SectionLabel::Skills),
        ("key skills", SectionLabel::Skills),
        ("core competencies", SectionLabel::Skills),
        ("competencies", SectionLabel::Skills),
        ("technologies", SectionLabel::Skills),
        ("tech stack", SectionLabel::Skills),
        ("projects", SectionLabel::Projects),
        ("personal projects", SectionLabel::Projects),
        ("selected projects", SectionLabel::Projects),
        ("side projects", SectionLabel::Projects),
        ("certifications", SectionLabel::Other),
        ("certificates", SectionLabel::Other),
        ("awards", SectionLabel::Other),
        ("honors", SectionLabel::Other),
        ("publications", SectionLabel::Other),
        ("languages", SectionLabel::Other),
        ("interests", SectionLabel::Other),
        ("volunteer experience", SectionLabel::Other),
        ("volunteering", SectionLabel::Other),
        ("references", SectionLabel::Other),
    ];
    ENTRIES
        .iter()
        .map(|(phrase, label)| (phrase.to_string(), *label))
        .collect()
}

const DEFAULT_SKILLS: &[&str] = &[
    "python",
    "java",
    "javascript",
    "typescript",
    "c++",
    "c#",
    "golang",
    "rust",
    "ruby",
    "php",
    "scala",
    "kotlin",
    "swift",
    "sql",
    "nosql",
    "postgresql",
    "mysql",
    "mongodb",
    "redis",
    "react",
    "angular",
    "vue",
    "node.js",
    "django",
    "flask",
    "spring",
    "spring boot",
    "docker",
    "kubernetes",
    "terraform",
    "aws",
    "azure",
    "gcp",
    "devops",
    "ci/cd",
    "linux",
    "kafka",
    "spark",
    "hadoop",
    "airflow",
    "pytorch",
    "tensorflow",
    "machine learning",
    "deep learning",
    "artificial intelligence",
    "data science",
    "distributed systems",
    "microservices",
    "rest api",
    "graphql",
    "git",
    "agile",
    "scrum",
    "html",
    "css",
    "tableau",
    "excel",
];
