//! Semantic Matcher — scores every requirement against every resume section and
//! derives the gap report.
//!
//! A section's score for a requirement is the best cosine similarity over the
//! section's whole evidence text and its evidence units (bullets, or lines when a
//! section has no bullets, plus the items of list-like lines such as "Python, SQL").
//! Each unique text is embedded exactly once per pass.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::alignment::models::{
    BulletScore, CandidateMatch, GapReport, JobRequirement, MatchEvidence, RequirementMatch,
    ResumeSection, SimilarityScore,
};
use crate::alignment::AlignError;
use crate::embedding::{cosine_similarity, Embedder};

/// List items longer than this are prose, not a skills list.
const LIST_ITEM_MAX_WORDS: usize = 4;

pub struct SemanticMatcher {
    embedder: Arc<dyn Embedder>,
    dimension: usize,
}

/// Texts a single section is scored through.
struct SectionEvidence<'s> {
    section: &'s ResumeSection,
    whole: String,
    units: Vec<String>,
}

impl SemanticMatcher {
    /// Fails with `DimensionMismatch` when the embedder does not produce `dimension`-long vectors.
    pub fn new(embedder: Arc<dyn Embedder>, dimension: usize) -> Result<Self, AlignError> {
        let actual = embedder.dimension();
        if actual != dimension {
            return Err(AlignError::DimensionMismatch {
                expected: dimension,
                actual,
            });
        }
        Ok(Self {
            embedder,
            dimension,
        })
    }

    /// Builds the gap report. No sections, no requirements and zero matches are all
    /// valid outcomes; only embedder failures are errors.
    pub fn match_requirements(
        &self,
        sections: &[ResumeSection],
        requirements: &[JobRequirement],
        threshold: f32,
    ) -> Result<GapReport, AlignError> {
        let evidence: Vec<SectionEvidence<'_>> = sections.iter().map(section_evidence).collect();

        let texts = requirements
            .iter()
            .map(|r| r.text.as_str())
            .chain(evidence.iter().flat_map(|e| {
                std::iter::once(e.whole.as_str()).chain(e.units.iter().map(String::as_str))
            }));
        let vectors = self.embed_unique(texts)?;

        let mut report = GapReport::empty(threshold);
        let mut section_best: BTreeMap<usize, f32> =
            sections.iter().map(|s| (s.ordinal_position, 0.0)).collect();
        let mut requirement_best = HashMap::new();
        let mut total_weight = 0.0_f32;
        let mut matched_weight = 0.0_f32;

        for requirement in requirements {
            total_weight += requirement.weight;

            let scores = score_sections(requirement, &evidence, &vectors);
            let mut best: Option<&SimilarityScore<'_>> = None;
            for score in &scores {
                let entry = section_best
                    .entry(score.section.ordinal_position)
                    .or_insert(0.0);
                *entry = entry.max(score.score);
                // Strict comparison keeps the earliest section on ties.
                if best.map_or(true, |b| score.score > b.score) {
                    best = Some(score);
                }
            }

            match best {
                Some(best) => {
                    requirement_best.insert(
                        requirement.key(),
                        CandidateMatch {
                            section_ordinal: best.section.ordinal_position,
                            score: best.score,
                        },
                    );
                    if best.score >= threshold {
                        matched_weight += best.score * requirement.weight;
                        report.matched.push(RequirementMatch {
                            requirement: requirement.clone(),
                            section: best.section.clone(),
                            score: best.score,
                        });
                    } else {
                        report.missing.push(requirement.clone());
                    }
                }
                None => report.missing.push(requirement.clone()),
            }
        }

        report.matched.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.requirement.weight.total_cmp(&a.requirement.weight))
                .then_with(|| a.requirement.text.cmp(&b.requirement.text))
        });
        report.missing.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.text.cmp(&b.text))
                .then_with(|| a.kind.cmp(&b.kind))
        });

        report.overall_score = if total_weight > 0.0 {
            (matched_weight / total_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };

        report.evidence = MatchEvidence {
            requirement_best,
            section_best,
            bullets: bullet_scores(sections, requirements, &vectors),
        };

        debug!(
            "Matched {}/{} requirements across {} sections (overall {:.3}, threshold {:.2}, {} unique texts embedded)",
            report.matched.len(),
            requirements.len(),
            sections.len(),
            report.overall_score,
            threshold,
            vectors.len()
        );
        Ok(report)
    }

    /// Embeds each distinct non-empty text once, checking every vector's length.
    fn embed_unique<'t>(
        &self,
        texts: impl Iterator<Item = &'t str>,
    ) -> Result<HashMap<&'t str, Vec<f32>>, AlignError> {
        let mut vectors = HashMap::new();
        for text in texts {
            if text.trim().is_empty() || vectors.contains_key(text) {
                continue;
            }
            let vector = self.embedder.embed(text)?;
            if vector.len() != self.dimension {
                return Err(AlignError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
            vectors.insert(text, vector);
        }
        Ok(vectors)
    }
}

fn section_evidence(section: &ResumeSection) -> SectionEvidence<'_> {
    let base: Vec<&str> = if section.bullet_points.is_empty() {
        section
            .raw_text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect()
    } else {
        section.bullet_points.iter().map(String::as_str).collect()
    };

    let mut units = Vec::new();
    for unit in base {
        units.push(unit.to_string());
        if let Some(items) = list_items(unit) {
            units.extend(items);
        }
    }

    SectionEvidence {
        section,
        whole: section.evidence_text(),
        units,
    }
}

/// Splits "Languages: Python, SQL | Docker" style lines into short items.
fn list_items(line: &str) -> Option<Vec<String>> {
    const SEPARATORS: &[char] = &[',', ';', '|', '•', ':'];
    if !line.contains(SEPARATORS) {
        return None;
    }
    let items: Vec<String> = line
        .split(SEPARATORS)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    let short = items
        .iter()
        .all(|item| item.split_whitespace().count() <= LIST_ITEM_MAX_WORDS);
    (items.len() >= 2 && short).then_some(items)
}

fn similarity(vectors: &HashMap<&str, Vec<f32>>, a: &str, b: &str) -> f32 {
    match (vectors.get(a), vectors.get(b)) {
        (Some(a), Some(b)) => cosine_similarity(a, b),
        _ => 0.0,
    }
}

fn score_sections<'a>(
    requirement: &'a JobRequirement,
    evidence: &[SectionEvidence<'a>],
    vectors: &HashMap<&str, Vec<f32>>,
) -> Vec<SimilarityScore<'a>> {
    evidence
        .iter()
        .map(|e| {
            let whole = similarity(vectors, &requirement.text, &e.whole);
            let score = e
                .units
                .iter()
                .map(|unit| similarity(vectors, &requirement.text, unit))
                .fold(whole, f32::max);
            SimilarityScore {
                section: e.section,
                requirement,
                score,
            }
        })
        .collect()
}

fn bullet_scores(
    sections: &[ResumeSection],
    requirements: &[JobRequirement],
    vectors: &HashMap<&str, Vec<f32>>,
) -> Vec<BulletScore> {
    sections
        .iter()
        .flat_map(|section| {
            section
                .bullet_points
                .iter()
                .enumerate()
                .map(move |(bullet_index, bullet)| {
                    let score = requirements
                        .iter()
                        .map(|r| similarity(vectors, &r.text, bullet))
                        .fold(0.0, f32::max);
                    BulletScore {
                        section_ordinal: section.ordinal_position,
                        bullet_index,
                        text: bullet.clone(),
                        score,
                    }
                })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::alignment::models::{RequirementKind, SectionLabel};
    use crate::embedding::EmbeddingError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One-hot-per-keyword embedder: a text's vector counts which keywords it mentions.
    pub(crate) struct KeywordEmbedder {
        pub keywords: Vec<&'static str>,
    }

    impl KeywordEmbedder {
        pub(crate) fn tech() -> Self {
            Self {
                keywords: vec!["python", "kubernetes", "sql", "rust", "docker", "lead"],
            }
        }
    }

    impl Embedder for KeywordEmbedder {
        fn dimension(&self) -> usize {
            self.keywords.len()
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let lower = text.to_lowercase();
            Ok(self
                .keywords
                .iter()
                .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                .collect())
        }
    }

    struct CountingEmbedder {
        inner: KeywordEmbedder,
        calls: AtomicUsize,
    }

    impl Embedder for CountingEmbedder {
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text)
        }
    }

    struct ShortEmbedder;

    impl Embedder for ShortEmbedder {
        fn dimension(&self) -> usize {
            4
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0, 0.0])
        }
    }

    pub(crate) fn section(
        label: SectionLabel,
        ordinal: usize,
        raw_text: &str,
        bullets: &[&str],
    ) -> ResumeSection {
        let mut s = ResumeSection::new(label, None, ordinal);
        s.raw_text = raw_text.to_string();
        s.bullet_points = bullets.iter().map(|b| b.to_string()).collect();
        s
    }

    fn matcher() -> SemanticMatcher {
        let embedder = KeywordEmbedder::tech();
        let dimension = embedder.dimension();
        SemanticMatcher::new(Arc::new(embedder), dimension).unwrap()
    }

    fn python_resume() -> Vec<ResumeSection> {
        vec![
            section(SectionLabel::Summary, 0, "Backend engineer", &[]),
            section(SectionLabel::Skills, 1, "Python, SQL", &[]),
        ]
    }

    fn scenario_requirements() -> Vec<JobRequirement> {
        vec![
            JobRequirement::new("Python", RequirementKind::RequiredSkill, 1.0),
            JobRequirement::new("Kubernetes", RequirementKind::PreferredSkill, 0.5),
        ]
    }

    #[test]
    fn test_python_kubernetes_scenario() {
        let report = matcher()
            .match_requirements(&python_resume(), &scenario_requirements(), 0.55)
            .unwrap();

        assert_eq!(report.matched.len(), 1);
        assert_eq!(report.matched[0].requirement.text, "Python");
        assert_eq!(report.matched[0].section.label, SectionLabel::Skills);
        assert!((report.matched[0].score - 1.0).abs() < 1e-6);

        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].text, "Kubernetes");

        assert!((report.overall_score - 2.0 / 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_every_requirement_is_matched_or_missing() {
        let requirements = vec![
            JobRequirement::new("Python", RequirementKind::RequiredSkill, 1.0),
            JobRequirement::new("Rust", RequirementKind::RequiredSkill, 1.0),
            JobRequirement::new("Docker", RequirementKind::PreferredSkill, 0.5),
            JobRequirement::new("SQL", RequirementKind::Qualification, 0.8),
        ];
        let report = matcher()
            .match_requirements(&python_resume(), &requirements, 0.55)
            .unwrap();

        assert_eq!(report.requirement_count(), requirements.len());
        for requirement in &requirements {
            assert!(report.is_matched(requirement) ^ report.is_missing(requirement));
        }
    }

    #[test]
    fn test_threshold_monotonicity() {
        let sections = vec![section(
            SectionLabel::Experience,
            0,
            "",
            &["Shipped Python and SQL services", "Ran Docker on Kubernetes"],
        )];
        let requirements = vec![
            JobRequirement::new("Python", RequirementKind::RequiredSkill, 1.0),
            JobRequirement::new("Rust and Python", RequirementKind::RequiredSkill, 1.0),
            JobRequirement::new("Kubernetes", RequirementKind::PreferredSkill, 0.5),
            JobRequirement::new("Rust", RequirementKind::PreferredSkill, 0.5),
        ];
        let m = matcher();
        let thresholds = [0.0, 0.3, 0.55, 0.71, 0.9, 1.0];
        let counts: Vec<usize> = thresholds
            .iter()
            .map(|t| m.match_requirements(&sections, &requirements, *t).unwrap().matched.len())
            .collect();
        assert!(counts.windows(2).all(|w| w[0] >= w[1]), "{counts:?}");

        let low = m.match_requirements(&sections, &requirements, 0.3).unwrap();
        let high = m.match_requirements(&sections, &requirements, 0.9).unwrap();
        for matched in &high.matched {
            assert!(low.is_matched(&matched.requirement));
        }
    }

    #[test]
    fn test_deterministic_with_stub_embedder() {
        let m = matcher();
        let first = m
            .match_requirements(&python_resume(), &scenario_requirements(), 0.55)
            .unwrap();
        let second = m
            .match_requirements(&python_resume(), &scenario_requirements(), 0.55)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_requirements_score_zero() {
        let report = matcher()
            .match_requirements(&python_resume(), &[], 0.55)
            .unwrap();
        assert_eq!(report.overall_score, 0.0);
        assert!(report.matched.is_empty());
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_no_sections_means_everything_missing() {
        let report = matcher()
            .match_requirements(&[], &scenario_requirements(), 0.0)
            .unwrap();
        assert!(report.matched.is_empty());
        assert_eq!(report.missing.len(), 2);
        assert_eq!(report.overall_score, 0.0);
    }

    #[test]
    fn test_each_unique_text_is_embedded_once() {
        let embedder = Arc::new(CountingEmbedder {
            inner: KeywordEmbedder::tech(),
            calls: AtomicUsize::new(0),
        });
        let dimension = embedder.dimension();
        let m = SemanticMatcher::new(embedder.clone(), dimension).unwrap();

        let sections = vec![
            section(SectionLabel::Skills, 0, "Python\nRust", &[]),
            section(SectionLabel::Projects, 1, "- Python", &["Python"]),
        ];
        let requirements = vec![
            JobRequirement::new("Python", RequirementKind::RequiredSkill, 1.0),
            JobRequirement::new("Rust", RequirementKind::RequiredSkill, 1.0),
        ];
        m.match_requirements(&sections, &requirements, 0.55).unwrap();

        // "Python", "Rust", "Python\nRust"
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_ordering_of_matched_and_missing() {
        let sections = vec![section(SectionLabel::Skills, 0, "Python\nSQL and Rust", &[])];
        let requirements = vec![
            JobRequirement::new("SQL", RequirementKind::PreferredSkill, 0.5),
            JobRequirement::new("Python", RequirementKind::RequiredSkill, 1.0),
            JobRequirement::new("Docker", RequirementKind::PreferredSkill, 0.5),
            JobRequirement::new("Kubernetes", RequirementKind::RequiredSkill, 1.0),
            JobRequirement::new("Rust", RequirementKind::PreferredSkill, 0.5),
        ];
        let report = matcher()
            .match_requirements(&sections, &requirements, 0.55)
            .unwrap();

        let matched: Vec<_> = report.matched.iter().map(|m| m.requirement.text.as_str()).collect();
        // Python 1.0; Rust and SQL tie at 0.707 with equal weight, so text decides
        assert_eq!(matched, vec!["Python", "Rust", "SQL"]);
        let missing: Vec<_> = report.missing.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(missing, vec!["Kubernetes", "Docker"]);
    }

    #[test]
    fn test_earliest_section_wins_ties() {
        let sections = vec![
            section(SectionLabel::Summary, 0, "Python developer", &[]),
            section(SectionLabel::Skills, 1, "Python", &[]),
        ];
        let requirements = vec![JobRequirement::new("Python", RequirementKind::RequiredSkill, 1.0)];
        let report = matcher()
            .match_requirements(&sections, &requirements, 0.55)
            .unwrap();
        assert_eq!(report.matched[0].section.ordinal_position, 0);
    }

    #[test]
    fn test_evidence_tracks_sections_and_bullets() {
        let sections = vec![
            section(SectionLabel::Summary, 0, "Backend engineer", &[]),
            section(
                SectionLabel::Experience,
                1,
                "",
                &["Built Python services", "Organized team lunches"],
            ),
        ];
        let report = matcher()
            .match_requirements(&sections, &scenario_requirements(), 0.55)
            .unwrap();

        assert_eq!(report.evidence.section_score(0), 0.0);
        assert!((report.evidence.section_score(1) - 1.0).abs() < 1e-6);
        let python = report.evidence.best_for(&scenario_requirements()[0]).unwrap();
        assert_eq!(python.section_ordinal, 1);

        assert_eq!(report.evidence.bullets.len(), 2);
        assert!((report.evidence.bullets[0].score - 1.0).abs() < 1e-6);
        assert_eq!(report.evidence.bullets[1].score, 0.0);
        assert_eq!(report.evidence.bullets[1].bullet_index, 1);
    }

    #[test]
    fn test_dimension_mismatch_at_construction() {
        let err = SemanticMatcher::new(Arc::new(KeywordEmbedder::tech()), 512)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AlignError::DimensionMismatch {
                expected: 512,
                actual: 6
            }
        ));
    }

    #[test]
    fn test_dimension_mismatch_on_returned_vector() {
        let m = SemanticMatcher::new(Arc::new(ShortEmbedder), 4).unwrap();
        let err = m
            .match_requirements(&python_resume(), &scenario_requirements(), 0.55)
            .unwrap_err();
        assert!(matches!(
            err,
            AlignError::DimensionMismatch {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_list_items() {
        assert_eq!(
            list_items("Languages: Python, SQL | Docker"),
            Some(vec![
                "Languages".to_string(),
                "Python".to_string(),
                "SQL".to_string(),
                "Docker".to_string()
            ])
        );
        assert_eq!(list_items("Built a thing"), None);
        assert_eq!(
            list_items("Led the migration of billing to a new platform, then mentored two hires"),
            None
        );
    }
}
