//! Tailoring pipeline — wires the alignment stages together and owns the retry policy
//! for the generative-text collaborator.
//!
//! Control flow:
//! resume bytes → extract → segment ─┐
//! job text → requirements ──────────┴→ match → gap report → assemble → (generate) → finalize

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::alignment::formatting::{self, FormattingIssue};
use crate::alignment::models::{
    GapReport, JobRequirement, ResumeSection, SectionLabel, TailoringSuggestion,
};
use crate::alignment::requirements::{self, Seniority};
use crate::alignment::{segmenter, suggestions, AlignError, AlignmentConfig, SemanticMatcher};
use crate::embedding::Embedder;
use crate::errors::AppError;
use crate::ingest::{self, ResumeDocument};
use crate::llm_client::{GenerationError, TextGenerator};
use crate::storage::DocumentHandle;

/// Result of one synchronous alignment pass.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub sections: Vec<ResumeSection>,
    pub requirements: Vec<JobRequirement>,
    pub seniority: Option<Seniority>,
    pub gap_report: GapReport,
    pub suggestions: Vec<TailoringSuggestion>,
    pub missing_sections: Vec<SectionLabel>,
    pub formatting_issues: Vec<FormattingIssue>,
    pub ats_score: f32,
}

/// The persisted artifact of a tailoring request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailoringReport {
    pub resume_handle: DocumentHandle,
    pub generated_at: DateTime<Utc>,
    pub threshold: f32,
    pub seniority: Option<Seniority>,
    pub sections: Vec<ResumeSection>,
    pub requirements: Vec<JobRequirement>,
    pub gap_report: GapReport,
    pub suggestions: Vec<TailoringSuggestion>,
    /// Canonical sections the resume does not have.
    pub missing_sections: Vec<SectionLabel>,
    pub formatting_issues: Vec<FormattingIssue>,
    /// 0–100 applicant-tracking readiness: formatting, section coverage, keyword coverage.
    pub ats_score: f32,
}

impl TailoringReport {
    pub fn new(analysis: Analysis, resume_handle: DocumentHandle) -> Self {
        Self {
            resume_handle,
            generated_at: Utc::now(),
            threshold: analysis.gap_report.threshold,
            seniority: analysis.seniority,
            sections: analysis.sections,
            requirements: analysis.requirements,
            gap_report: analysis.gap_report,
            suggestions: analysis.suggestions,
            missing_sections: analysis.missing_sections,
            formatting_issues: analysis.formatting_issues,
            ats_score: analysis.ats_score,
        }
    }
}

/// Stateless alignment engine. Shared across requests behind an `Arc`.
pub struct TailoringEngine {
    config: AlignmentConfig,
    matcher: SemanticMatcher,
}

impl TailoringEngine {
    pub fn new(config: AlignmentConfig, embedder: Arc<dyn Embedder>) -> Result<Self, AlignError> {
        let matcher = SemanticMatcher::new(embedder, config.embedding_dimension)?;
        Ok(Self { config, matcher })
    }

    pub fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    /// Runs every CPU-bound stage. `threshold` defaults to the configured match threshold.
    pub fn analyze(
        &self,
        document: &ResumeDocument,
        job_text: &str,
        threshold: Option<f32>,
    ) -> Result<Analysis, AlignError> {
        let extracted = ingest::extract(document)?;
        let sections = segmenter::segment(&extracted.text, &extracted.layout_hints, &self.config)?;

        let requirements = requirements::extract(job_text, &self.config);
        let seniority = requirements::detect_seniority(job_text);

        let threshold = threshold.unwrap_or(self.config.match_threshold);
        let gap_report = self
            .matcher
            .match_requirements(&sections, &requirements, threshold)?;
        let suggestions = suggestions::assemble(&gap_report, &sections, &self.config);
        let missing_sections = missing_sections(&sections);
        let formatting_issues = formatting::analyze(&extracted.text);
        let ats_score = formatting::ats_score(&formatting_issues, &missing_sections, &gap_report);

        info!(
            "Aligned resume ({} sections) with job ({} requirements): score {:.3}, {} matched, {} missing, {} suggestions, ATS {:.1}",
            sections.len(),
            requirements.len(),
            gap_report.overall_score,
            gap_report.matched.len(),
            gap_report.missing.len(),
            suggestions.len(),
            ats_score
        );

        Ok(Analysis {
            sections,
            requirements,
            seniority,
            gap_report,
            suggestions,
            missing_sections,
            formatting_issues,
            ats_score,
        })
    }
}

fn missing_sections(sections: &[ResumeSection]) -> Vec<SectionLabel> {
    SectionLabel::CANONICAL
        .iter()
        .copied()
        .filter(|label| !sections.iter().any(|s| s.label == *label))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Generation with retry
// ────────────────────────────────────────────────────────────────────────────

/// Exponential backoff for transient generation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based). A server `Retry-After` hint wins
    /// over the computed backoff; both are capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32, error: &GenerationError) -> Duration {
        let backoff = match error {
            GenerationError::RateLimited {
                retry_after: Some(hint),
            } => *hint,
            _ => self.base_delay.saturating_mul(1 << attempt.min(16)),
        };
        backoff.min(self.max_delay)
    }
}

/// Calls the generator, retrying transient failures. The last error is returned
/// unmodified once retries are exhausted.
pub async fn generate_with_retry(
    generator: &dyn TextGenerator,
    suggestion: &TailoringSuggestion,
    policy: &RetryPolicy,
) -> Result<String, GenerationError> {
    let mut attempt = 0;
    loop {
        match generator
            .generate(&suggestion.prompt, &suggestion.context)
            .await
        {
            Ok(text) => return Ok(text),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt, &e);
                warn!(
                    "Generation for suggestion {} failed ({e}), retrying after {}ms...",
                    suggestion.id,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Requests text for every pending suggestion and merges it back.
pub async fn fill_suggestions(
    generator: &dyn TextGenerator,
    suggestions: Vec<TailoringSuggestion>,
    policy: &RetryPolicy,
) -> Result<Vec<TailoringSuggestion>, AppError> {
    let mut responses: HashMap<Uuid, String> = HashMap::new();
    for suggestion in suggestions.iter().filter(|s| s.is_pending()) {
        let text = generate_with_retry(generator, suggestion, policy).await?;
        responses.insert(suggestion.id, text);
    }
    info!("Generated text for {} suggestions", responses.len());
    Ok(suggestions::finalize(suggestions, &responses)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::alignment::models::{ProposedText, SuggestionIssue};
    use crate::embedding::HashingEmbedder;
    use crate::ingest::DocumentFormat;

    const RESUME: &str = "Jane Doe\n\nSkills\nPython, SQL\n\nExperience\n- Built Python services handling 2M requests/day\n- Helped with office moves\n";
    const JOB: &str = "Must have Python. Nice to have Kubernetes.";

    fn engine() -> TailoringEngine {
        let config = AlignmentConfig::default();
        let embedder = Arc::new(HashingEmbedder::new(config.embedding_dimension));
        TailoringEngine::new(config, embedder).unwrap()
    }

    fn text_document(text: &str) -> ResumeDocument {
        ResumeDocument::new(text.as_bytes().to_vec(), DocumentFormat::Text)
    }

    /// Replays scripted results, then succeeds with the prompt's first word.
    struct ScriptedGenerator {
        script: Mutex<Vec<Result<String, GenerationError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedGenerator {
        fn new(mut script: Vec<Result<String, GenerationError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            context: &BTreeMap<String, String>,
        ) -> Result<String, GenerationError> {
            *self.calls.lock().unwrap() += 1;
            match self.script.lock().unwrap().pop() {
                Some(result) => result,
                None => Ok(format!("generated ({} context keys)", context.len())),
            }
        }
    }

    fn unavailable() -> Result<String, GenerationError> {
        Err(GenerationError::ServiceUnavailable("down".into()))
    }

    fn pending_suggestion() -> TailoringSuggestion {
        TailoringSuggestion {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, b"test"),
            target_section: None,
            issue: SuggestionIssue::GenericSummary,
            rationale: String::new(),
            bullet: None,
            prompt: "Write a summary".into(),
            context: BTreeMap::new(),
            proposed_text: ProposedText::Pending,
        }
    }

    #[test]
    fn test_analyze_python_kubernetes_scenario() {
        let analysis = engine().analyze(&text_document(RESUME), JOB, None).unwrap();

        assert_eq!(analysis.requirements.len(), 2);
        assert_eq!(analysis.gap_report.matched.len(), 1);
        assert_eq!(analysis.gap_report.matched[0].requirement.text, "Python");
        assert_eq!(analysis.gap_report.missing[0].text, "Kubernetes");
        assert!((analysis.gap_report.overall_score - 2.0 / 3.0).abs() < 1e-3);
        assert!((analysis.gap_report.threshold - 0.55).abs() < 1e-6);

        assert_eq!(
            analysis.missing_sections,
            vec![SectionLabel::Summary, SectionLabel::Education, SectionLabel::Projects]
        );

        let summaries: Vec<_> = analysis
            .suggestions
            .iter()
            .filter(|s| s.issue == SuggestionIssue::GenericSummary)
            .collect();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].target_section.is_none());
        assert!(analysis.suggestions.iter().all(TailoringSuggestion::is_pending));
    }

    #[test]
    fn test_analyze_honors_threshold_override() {
        let analysis = engine()
            .analyze(&text_document(RESUME), JOB, Some(1.0))
            .unwrap();
        assert!((analysis.gap_report.threshold - 1.0).abs() < 1e-6);
        assert!(analysis.gap_report.matched.len() <= 1);
    }

    #[test]
    fn test_analyze_surfaces_input_errors() {
        let err = engine()
            .analyze(&text_document("  \n "), JOB, None)
            .unwrap_err();
        assert!(matches!(err, AlignError::EmptyDocument));

        let pdf = ResumeDocument::new(b"not a pdf".to_vec(), DocumentFormat::Pdf);
        let err = engine().analyze(&pdf, JOB, None).unwrap_err();
        assert!(matches!(err, AlignError::CorruptDocument(_)));
    }

    #[test]
    fn test_engine_rejects_mismatched_embedder() {
        let result = TailoringEngine::new(AlignmentConfig::default(), Arc::new(HashingEmbedder::new(8)));
        assert!(matches!(
            result,
            Err(AlignError::DimensionMismatch {
                expected: 512,
                actual: 8
            })
        ));
    }

    #[test]
    fn test_analyze_reports_formatting_issues() {
        let resume = "Summary\nBackend engineer.\n\nSkills\nPython, SQL\n\nExperience\nAcme, Jan 2020 - 03/2023\n- Built Python services\n• Ran on-call\n";
        let analysis = engine().analyze(&text_document(resume), JOB, None).unwrap();

        assert_eq!(
            analysis.formatting_issues,
            vec![
                FormattingIssue::InconsistentBulletGlyphs {
                    glyphs: vec!['-', '•']
                },
                FormattingIssue::InconsistentDateFormats {
                    styles: vec![
                        formatting::DateStyle::MonthName,
                        formatting::DateStyle::NumericMonth
                    ]
                },
            ]
        );
        // Education and Projects missing; Python matched, Kubernetes missing.
        let expected = (100.0 - 10.0 - 6.0) * (0.7 + 0.3 * 0.5);
        assert!((analysis.ats_score - expected).abs() < 1e-3, "{}", analysis.ats_score);

        let report = TailoringReport::new(analysis, DocumentHandle::generate());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["formatting_issues"][0]["issue"], "inconsistent_bullet_glyphs");
    }

    #[test]
    fn test_report_carries_analysis() {
        let analysis = engine().analyze(&text_document(RESUME), JOB, None).unwrap();
        let handle = DocumentHandle::generate();
        let report = TailoringReport::new(analysis.clone(), handle.clone());
        assert_eq!(report.resume_handle, handle);
        assert_eq!(report.sections, analysis.sections);

        let json = serde_json::to_string(&report).unwrap();
        let back: TailoringReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.suggestions, report.suggestions);
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy::default();
        let err = GenerationError::ServiceUnavailable("down".into());
        assert_eq!(policy.delay_for(0, &err), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2, &err), Duration::from_secs(2));
        assert_eq!(policy.delay_for(10, &err), Duration::from_secs(8));

        let hinted = GenerationError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(policy.delay_for(0, &hinted), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let generator = ScriptedGenerator::new(vec![unavailable(), unavailable()]);
        let text = generate_with_retry(&generator, &pending_suggestion(), &RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(text, "generated (0 context keys)");
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_last_error_unmodified() {
        let rate_limited = || {
            Err(GenerationError::RateLimited {
                retry_after: Some(Duration::from_secs(1)),
            })
        };
        let generator = ScriptedGenerator::new(vec![rate_limited(), rate_limited(), rate_limited()]);
        let err = generate_with_retry(&generator, &pending_suggestion(), &RetryPolicy::with_max_retries(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(1)
        ));
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_requests_are_not_retried() {
        let generator = ScriptedGenerator::new(vec![Err(GenerationError::Rejected {
            status: 400,
            message: "bad".into(),
        })]);
        let err = generate_with_retry(&generator, &pending_suggestion(), &RetryPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Rejected { status: 400, .. }));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_suggestions_makes_every_suggestion_ready() {
        let analysis = engine().analyze(&text_document(RESUME), JOB, None).unwrap();
        let count = analysis.suggestions.len();
        let generator = ScriptedGenerator::new(vec![unavailable()]);

        let filled = fill_suggestions(&generator, analysis.suggestions, &RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(filled.len(), count);
        assert!(filled
            .iter()
            .all(|s| matches!(&s.proposed_text, ProposedText::Ready(t) if t.starts_with("generated"))));
        assert_eq!(generator.calls() as usize, count + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_suggestions_propagates_generation_errors() {
        let generator = ScriptedGenerator::new((0..4).map(|_| unavailable()).collect());
        let err = fill_suggestions(&generator, vec![pending_suggestion()], &RetryPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Generation(GenerationError::ServiceUnavailable(_))
        ));
    }
}
