// Prompt templates for tailoring suggestions.
// Placeholders are `{key}` names from the suggestion's context map; `render` fills them.
// Reuses cross-cutting fragments from llm_client::prompts.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::llm_client::prompts::GROUNDING_INSTRUCTION;

/// Skill-suggestion prompt for a requirement the resume does not cover.
/// Context keys: {requirement}, {requirement_kind}, {target_section}, {section_text}
pub const MISSING_SKILL_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

The target job lists this {requirement_kind}: "{requirement}".
The resume does not demonstrate it clearly.

RESUME SECTION ({target_section}):
{section_text}

Rewrite or extend this section so that it surfaces "{requirement}" using only experience
already present in the section. If the section holds no honest evidence for it, reply with
one short sentence the candidate could add once they have that experience, prefixed with
"If applicable:".

Return only the proposed text."#;

/// Bullet improvement prompt.
/// Context keys: {bullet}, {section}, {diagnostics}, {key_requirements}
pub const WEAK_BULLET_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

Improve this resume bullet from the {section} section:
"{bullet}"

Problems found: {diagnostics}

The target job emphasizes: {key_requirements}

Rules:
1. Open with a strong action verb (Built, Led, Reduced, Designed, Shipped)
2. Keep a measurable outcome if the original has one; never invent numbers
3. Connect the work to the job's emphasis only where the original supports it
4. One line, no trailing period

Return only the rewritten bullet."#;

/// Professional-summary prompt, used both to rewrite a weak summary and to draft a missing one.
/// Context keys: {current_summary}, {key_requirements}, {matched_skills}
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

Write a 2-3 sentence professional summary for this candidate, tailored to the target job.

CURRENT SUMMARY:
{current_summary}

SKILLS THE RESUME ALREADY DEMONSTRATES FOR THIS JOB:
{matched_skills}

WHAT THE JOB EMPHASIZES:
{key_requirements}

Lead with the candidate's strongest relevant experience. Avoid generic phrases
("hard-working", "team player", "results-driven").

Return only the summary text."#;

/// Fills `{key}` placeholders from `context`. Unknown placeholders are left untouched, and
/// substituted values are never rescanned.
pub fn render(template: &str, context: &BTreeMap<String, String>) -> String {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let placeholder =
        PLACEHOLDER.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("static regex"));

    placeholder
        .replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            if key == "grounding_instruction" {
                return GROUNDING_INSTRUCTION.to_string();
            }
            context
                .get(key)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
