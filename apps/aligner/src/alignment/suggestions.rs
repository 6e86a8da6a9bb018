//! Suggestion Assembler — turns a gap report into pending suggestion requests for the
//! generative-text collaborator, and merges its responses back.
//!
//! Pure data: no I/O happens here. Request ids are UUID v5 over a stable key, so the
//! same resume and job produce the same ids on every run.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;
use uuid::Uuid;

use crate::alignment::config::AlignmentConfig;
use crate::alignment::models::{
    normalize_text, BulletScore, GapReport, JobRequirement, ProposedText, ResumeSection,
    SectionLabel, SuggestionIssue, TailoringSuggestion,
};
use crate::alignment::prompts::{
    render, MISSING_SKILL_PROMPT_TEMPLATE, SUMMARY_PROMPT_TEMPLATE, WEAK_BULLET_PROMPT_TEMPLATE,
};
use crate::alignment::AlignError;

/// Leading verbs that undersell the candidate's ownership.
const WEAK_VERBS: &[&str] = &["worked", "helped", "assisted", "participated", "involved"];

/// How many requirements a prompt lists as the job's emphasis.
const KEY_REQUIREMENT_LIMIT: usize = 5;

const NONE_PLACEHOLDER: &str = "(none)";

/// Builds pending suggestions in a fixed order: missing skills (gap report order), weak
/// bullets (document order), then at most one summary suggestion.
pub fn assemble(
    report: &GapReport,
    sections: &[ResumeSection],
    config: &AlignmentConfig,
) -> Vec<TailoringSuggestion> {
    let key_requirements = key_requirements(report);
    let mut suggestions = Vec::new();

    for requirement in &report.missing {
        suggestions.push(missing_skill(report, requirement, sections, config.suggestion_floor));
    }

    // Without requirements every bullet would read as weak; there is nothing to align to.
    if report.requirement_count() > 0 {
        for bullet in report
            .evidence
            .bullets
            .iter()
            .filter(|b| b.score < report.threshold)
        {
            suggestions.push(weak_bullet(report, bullet, sections, &key_requirements));
        }
    }

    if let Some(summary) = generic_summary(report, sections, &key_requirements) {
        suggestions.push(summary);
    }

    debug!(
        "Assembled {} suggestions ({} missing skills)",
        suggestions.len(),
        report.missing.len()
    );
    suggestions
}

/// Merges generated text into pending suggestions.
///
/// Every pending suggestion needs a non-blank response, otherwise the whole batch fails
/// with `IncompleteResponse` naming the unresolved ids. Suggestions already `Ready`
/// keep their text; responses for them are ignored.
pub fn finalize(
    mut suggestions: Vec<TailoringSuggestion>,
    responses: &HashMap<Uuid, String>,
) -> Result<Vec<TailoringSuggestion>, AlignError> {
    let unresolved: Vec<Uuid> = suggestions
        .iter()
        .filter(|s| s.is_pending())
        .filter(|s| responses.get(&s.id).map_or(true, |text| text.trim().is_empty()))
        .map(|s| s.id)
        .collect();
    if !unresolved.is_empty() {
        return Err(AlignError::IncompleteResponse { unresolved });
    }

    for suggestion in suggestions.iter_mut().filter(|s| s.is_pending()) {
        if let Some(text) = responses.get(&suggestion.id) {
            suggestion.proposed_text = ProposedText::Ready(text.trim().to_string());
        }
    }
    Ok(suggestions)
}

/// Observations about a bullet's wording, independent of the job.
pub fn bullet_diagnostics(bullet: &str) -> Vec<String> {
    let mut diagnostics = Vec::new();

    if let Some(first) = bullet.split_whitespace().next() {
        let verb = first
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if WEAK_VERBS.contains(&verb.as_str()) {
            diagnostics.push(format!("opens with the weak verb \"{verb}\""));
        }
    }
    if !bullet.contains(|c: char| c.is_ascii_digit() || c == '%' || c == '$') {
        diagnostics.push("no measurable outcome (numbers, %, $)".to_string());
    }
    diagnostics
}

// ────────────────────────────────────────────────────────────────────────────
// Per-issue builders
// ────────────────────────────────────────────────────────────────────────────

fn missing_skill(
    report: &GapReport,
    requirement: &JobRequirement,
    sections: &[ResumeSection],
    floor: f32,
) -> TailoringSuggestion {
    let candidate = report.evidence.best_for(requirement);
    let best_score = candidate.map_or(0.0, |c| c.score);
    let target = candidate
        .filter(|c| c.score > floor)
        .and_then(|c| section_at(sections, c.section_ordinal));

    let rationale = match target {
        Some(section) => format!(
            "The job lists \"{}\" as a {} (weight {:.2}). The closest evidence is the {} section \
             at {:.2}, below the {:.2} match threshold.",
            requirement.text,
            requirement.kind,
            requirement.weight,
            section.display_name(),
            best_score,
            report.threshold
        ),
        None => format!(
            "The job lists \"{}\" as a {} (weight {:.2}) and no resume section relates to it \
             (best similarity {:.2}).",
            requirement.text, requirement.kind, requirement.weight, best_score
        ),
    };

    let mut context = BTreeMap::new();
    context.insert("requirement".to_string(), requirement.text.clone());
    context.insert("requirement_kind".to_string(), requirement.kind.to_string());
    context.insert(
        "target_section".to_string(),
        target.map_or_else(|| "new content".to_string(), ResumeSection::display_name),
    );
    context.insert(
        "section_text".to_string(),
        target.map_or_else(|| NONE_PLACEHOLDER.to_string(), ResumeSection::evidence_text),
    );

    let (text, kind) = requirement.key();
    build(
        format!("missing_skill|{}|{}", text, kind.as_str()),
        SuggestionIssue::MissingSkill,
        target.cloned(),
        rationale,
        None,
        MISSING_SKILL_PROMPT_TEMPLATE,
        context,
    )
}

fn weak_bullet(
    report: &GapReport,
    bullet: &BulletScore,
    sections: &[ResumeSection],
    key_requirements: &str,
) -> TailoringSuggestion {
    let target = section_at(sections, bullet.section_ordinal);
    let diagnostics = bullet_diagnostics(&bullet.text);

    let mut rationale = format!(
        "This bullet relates to the job's requirements at {:.2}, below the {:.2} threshold.",
        bullet.score, report.threshold
    );
    if !diagnostics.is_empty() {
        rationale.push_str(" Also: ");
        rationale.push_str(&diagnostics.join("; "));
        rationale.push('.');
    }

    let mut context = BTreeMap::new();
    context.insert("bullet".to_string(), bullet.text.clone());
    context.insert(
        "section".to_string(),
        target.map_or_else(|| SectionLabel::Experience.to_string(), ResumeSection::display_name),
    );
    context.insert(
        "diagnostics".to_string(),
        if diagnostics.is_empty() {
            "weak alignment with the target job".to_string()
        } else {
            diagnostics.join("; ")
        },
    );
    context.insert("key_requirements".to_string(), key_requirements.to_string());

    build(
        format!(
            "weak_bullet|{}|{}|{}",
            bullet.section_ordinal,
            bullet.bullet_index,
            normalize_text(&bullet.text)
        ),
        SuggestionIssue::WeakBullet,
        target.cloned(),
        rationale,
        Some(bullet.text.clone()),
        WEAK_BULLET_PROMPT_TEMPLATE,
        context,
    )
}

/// One suggestion when the first Summary section scores below threshold, or when the
/// resume has no Summary at all (targeting `None`, i.e. new content).
fn generic_summary(
    report: &GapReport,
    sections: &[ResumeSection],
    key_requirements: &str,
) -> Option<TailoringSuggestion> {
    let summary = sections.iter().find(|s| s.label == SectionLabel::Summary);

    let (rationale, key) = match summary {
        Some(section) => {
            let score = report.evidence.section_score(section.ordinal_position);
            if score >= report.threshold {
                return None;
            }
            (
                format!(
                    "The summary relates to the job's requirements at {:.2}, below the {:.2} \
                     threshold.",
                    score, report.threshold
                ),
                format!("generic_summary|{}", section.ordinal_position),
            )
        }
        None => (
            "The resume has no summary section; a short tailored summary helps screeners \
             see the fit at a glance."
                .to_string(),
            "generic_summary|none".to_string(),
        ),
    };

    let matched = distinct_ignore_case(report.matched.iter().map(|m| m.requirement.text.as_str()));

    let mut context = BTreeMap::new();
    context.insert(
        "current_summary".to_string(),
        summary.map_or_else(|| NONE_PLACEHOLDER.to_string(), |s| s.raw_text.clone()),
    );
    context.insert("key_requirements".to_string(), key_requirements.to_string());
    context.insert(
        "matched_skills".to_string(),
        if matched.is_empty() {
            NONE_PLACEHOLDER.to_string()
        } else {
            matched.join(", ")
        },
    );

    Some(build(
        key,
        SuggestionIssue::GenericSummary,
        summary.cloned(),
        rationale,
        None,
        SUMMARY_PROMPT_TEMPLATE,
        context,
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn build(
    key: String,
    issue: SuggestionIssue,
    target_section: Option<ResumeSection>,
    rationale: String,
    bullet: Option<String>,
    template: &str,
    context: BTreeMap<String, String>,
) -> TailoringSuggestion {
    TailoringSuggestion {
        id: Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()),
        target_section,
        issue,
        rationale,
        bullet,
        prompt: render(template, &context),
        context,
        proposed_text: ProposedText::Pending,
    }
}

fn section_at(sections: &[ResumeSection], ordinal: usize) -> Option<&ResumeSection> {
    sections.iter().find(|s| s.ordinal_position == ordinal)
}

/// Highest-weight requirements (missing or matched), comma separated.
fn key_requirements(report: &GapReport) -> String {
    let mut all: Vec<&JobRequirement> = report
        .missing
        .iter()
        .chain(report.matched.iter().map(|m| &m.requirement))
        .collect();
    all.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.text.cmp(&b.text)));

    let mut seen = distinct_ignore_case(all.into_iter().map(|r| r.text.as_str()));
    seen.truncate(KEY_REQUIREMENT_LIMIT);
    if seen.is_empty() {
        NONE_PLACEHOLDER.to_string()
    } else {
        seen.join(", ")
    }
}

/// First occurrence of each text, compared case-insensitively, in input order.
fn distinct_ignore_case<'a>(texts: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen: Vec<&str> = Vec::new();
    for text in texts {
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(text)) {
            seen.push(text);
        }
    }
    seen
}
