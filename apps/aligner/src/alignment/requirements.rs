//! Requirement Extractor — turns a free-text job posting into weighted requirements.
//!
//! The posting is split into units (lines, bullets, sentences). Each unit is classified
//! by lexical cues, then mined for skill phrases (dictionary hits, capitalized tokens).
//! Units yielding no phrase are kept whole.
//!
//! Weights: required=1.0, qualification=0.8, responsibility=0.6, preferred=0.5 by default,
//! boosted when the phrase recurs in the posting.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alignment::config::AlignmentConfig;
use crate::alignment::models::{JobRequirement, RequirementKind};
use crate::alignment::segmenter::strip_bullet;

/// Seniority signal read from the posting's title and years-of-experience figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    Intern,
    Junior,
    Mid,
    Senior,
    Lead,
    Principal,
}

/// What a posting heading ("Requirements:", "About us:") says about the units below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeadingContext {
    Kind(RequirementKind),
    Neutral,
}

#[derive(Debug)]
struct Unit {
    text: String,
    context: Option<HeadingContext>,
}

#[derive(Debug, PartialEq)]
struct Phrase {
    text: String,
    from_dictionary: bool,
}

const PREFERRED_CUES: &[&str] = &[
    "nice to have",
    "nice-to-have",
    "good to have",
    "preferred",
    "preferably",
    "bonus",
    "a plus",
    "desirable",
    "ideally",
    "advantageous",
];

const REQUIRED_CUES: &[&str] = &[
    "must",
    "required",
    "requires",
    "require",
    "need to",
    "needs to",
    "you need",
    "mandatory",
    "essential",
];

const HEADING_CUES: &[(&str, HeadingContext)] = &[
    ("requirements", HeadingContext::Kind(RequirementKind::RequiredSkill)),
    ("required", HeadingContext::Kind(RequirementKind::RequiredSkill)),
    ("required skills", HeadingContext::Kind(RequirementKind::RequiredSkill)),
    ("must have", HeadingContext::Kind(RequirementKind::RequiredSkill)),
    ("must-have", HeadingContext::Kind(RequirementKind::RequiredSkill)),
    ("what you need", HeadingContext::Kind(RequirementKind::RequiredSkill)),
    ("what you'll need", HeadingContext::Kind(RequirementKind::RequiredSkill)),
    ("what we're looking for", HeadingContext::Kind(RequirementKind::RequiredSkill)),
    ("qualifications", HeadingContext::Kind(RequirementKind::Qualification)),
    ("minimum qualifications", HeadingContext::Kind(RequirementKind::Qualification)),
    ("basic qualifications", HeadingContext::Kind(RequirementKind::Qualification)),
    ("education", HeadingContext::Kind(RequirementKind::Qualification)),
    ("preferred", HeadingContext::Kind(RequirementKind::PreferredSkill)),
    ("preferred qualifications", HeadingContext::Kind(RequirementKind::PreferredSkill)),
    ("preferred skills", HeadingContext::Kind(RequirementKind::PreferredSkill)),
    ("nice to have", HeadingContext::Kind(RequirementKind::PreferredSkill)),
    ("nice-to-have", HeadingContext::Kind(RequirementKind::PreferredSkill)),
    ("bonus", HeadingContext::Kind(RequirementKind::PreferredSkill)),
    ("bonus points", HeadingContext::Kind(RequirementKind::PreferredSkill)),
    ("responsibilities", HeadingContext::Kind(RequirementKind::Responsibility)),
    ("key responsibilities", HeadingContext::Kind(RequirementKind::Responsibility)),
    ("what you'll do", HeadingContext::Kind(RequirementKind::Responsibility)),
    ("what you will do", HeadingContext::Kind(RequirementKind::Responsibility)),
    ("duties", HeadingContext::Kind(RequirementKind::Responsibility)),
    ("the role", HeadingContext::Kind(RequirementKind::Responsibility)),
    ("about", HeadingContext::Neutral),
    ("about us", HeadingContext::Neutral),
    ("about the company", HeadingContext::Neutral),
    ("who we are", HeadingContext::Neutral),
    ("benefits", HeadingContext::Neutral),
    ("perks", HeadingContext::Neutral),
    ("compensation", HeadingContext::Neutral),
    ("location", HeadingContext::Neutral),
];

const ACTION_VERBS: &[&str] = &[
    "analyze", "architect", "automate", "build", "collaborate", "communicate", "contribute",
    "coordinate", "create", "debug", "define", "deliver", "deploy", "design", "develop", "drive",
    "ensure", "establish", "evaluate", "implement", "improve", "integrate", "investigate", "lead",
    "maintain", "manage", "mentor", "monitor", "operate", "optimize", "own", "partner", "plan",
    "publish", "research", "review", "scale", "ship", "spearhead", "support", "test",
    "troubleshoot", "work", "write",
];

/// Nouns that mark a first line as a posting title ("Senior Rust Engineer").
const ROLE_NOUNS: &[&str] = &[
    "administrator", "analyst", "architect", "consultant", "designer", "developer", "director",
    "engineer", "intern", "manager", "officer", "programmer", "scientist", "specialist",
    "technician",
];

/// Leading phrases stripped before looking for a duty's action verb.
const DUTY_PREFIXES: &[&str] = &["you will be ", "you will ", "you'll ", "will ", "responsible for "];

/// Capitalized words that are sentence furniture, not skills.
const STOPWORDS: &[&str] = &[
    "a", "about", "ability", "an", "and", "are", "as", "at", "bachelor", "be", "bonus", "degree",
    "doctorate", "etc",
    "excellent", "experience", "expertise", "familiarity", "for", "good", "great", "have",
    "i", "in", "including", "is", "join", "junior", "knowledge", "master", "masters", "must",
    "nice", "of", "on",
    "or", "our", "plus", "preferred", "proficiency", "proven", "qualifications", "required",
    "requirements", "responsibilities", "senior", "skills", "solid", "strong", "team", "the",
    "to", "understanding", "us", "we", "will", "with", "years", "you", "your",
];

/// Extracts requirements in order of first appearance, deduplicated by normalized
/// text + kind. Never fails: a posting with no recognizable requirement yields an empty list.
pub fn extract(job_text: &str, config: &AlignmentConfig) -> Vec<JobRequirement> {
    let mut dictionary: Vec<String> = config
        .skill_dictionary
        .iter()
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    dictionary.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    dictionary.dedup();

    let job_lower = job_text.to_ascii_lowercase();
    let units = split_units(job_text, &dictionary);

    let mut requirements: Vec<JobRequirement> = Vec::new();
    let mut index_by_key = HashMap::new();

    for unit in &units {
        let phrases = extract_phrases(&unit.text, &dictionary);
        let has_dictionary_hit = phrases.iter().any(|p| p.from_dictionary);
        let Some(kind) = classify(&unit.text, unit.context, has_dictionary_hit) else {
            continue;
        };

        let texts: Vec<String> = if phrases.is_empty() {
            vec![clean_unit(&unit.text)]
        } else {
            phrases.into_iter().map(|p| p.text).collect()
        };

        for text in texts {
            if text.is_empty() {
                continue;
            }
            let mut weight = config.kind_weights.for_kind(kind);
            if count_occurrences(&job_lower, &text.to_ascii_lowercase()) > 1 {
                weight += config.repetition_boost;
            }
            let requirement = JobRequirement::new(text, kind, weight.min(1.0));

            let key = requirement.key();
            match index_by_key.get(&key) {
                Some(&i) => {
                    let existing: &mut JobRequirement = &mut requirements[i];
                    existing.weight = existing.weight.max(requirement.weight);
                }
                None => {
                    index_by_key.insert(key, requirements.len());
                    requirements.push(requirement);
                }
            }
        }
    }

    debug!(
        "Extracted {} requirements from {} job-text units",
        requirements.len(),
        units.len()
    );
    requirements
}

/// Reads seniority from title words on the first line, falling back to the largest
/// years-of-experience figure anywhere in the posting.
pub fn detect_seniority(job_text: &str) -> Option<Seniority> {
    const TITLE_CUES: &[(&str, Seniority)] = &[
        ("principal", Seniority::Principal),
        ("staff", Seniority::Principal),
        ("distinguished", Seniority::Principal),
        ("head of", Seniority::Lead),
        ("lead", Seniority::Lead),
        ("senior", Seniority::Senior),
        ("sr", Seniority::Senior),
        ("mid-level", Seniority::Mid),
        ("mid level", Seniority::Mid),
        ("junior", Seniority::Junior),
        ("jr", Seniority::Junior),
        ("entry level", Seniority::Junior),
        ("entry-level", Seniority::Junior),
        ("graduate", Seniority::Junior),
        ("intern", Seniority::Intern),
        ("internship", Seniority::Intern),
    ];

    if let Some(title) = job_text.lines().map(str::trim).find(|l| !l.is_empty()) {
        let title = title.to_ascii_lowercase();
        for (cue, level) in TITLE_CUES {
            if count_occurrences(&title, cue) > 0 {
                return Some(*level);
            }
        }
    }

    let years = years_re()
        .captures_iter(job_text)
        .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse::<u32>().ok()))
        .max()?;
    Some(match years {
        0..=1 => Seniority::Junior,
        2..=4 => Seniority::Mid,
        5..=7 => Seniority::Senior,
        _ => Seniority::Lead,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Unit splitting
// ────────────────────────────────────────────────────────────────────────────

fn split_units(job_text: &str, dictionary: &[String]) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut context: Option<HeadingContext> = None;
    let mut seen_first_line = false;

    for raw_line in job_text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if !seen_first_line {
            seen_first_line = true;
            if is_title_line(line, dictionary) {
                continue;
            }
        }
        let line = strip_bullet(line).unwrap_or(line);

        for sentence in split_sentences(line) {
            let mut sentence = sentence;
            if let Some((heading, rest)) = split_heading(sentence) {
                context = Some(heading);
                sentence = rest.trim();
                if sentence.is_empty() {
                    continue;
                }
            }
            units.push(Unit {
                text: sentence.to_string(),
                context,
            });
        }
    }
    units
}

/// A short first line without terminal punctuation or cues is the posting title, as
/// long as it names a role or carries no requirement signal of its own (qualification
/// pattern, known skill, leading action verb).
fn is_title_line(line: &str, dictionary: &[String]) -> bool {
    let lower = line.to_ascii_lowercase();
    let shaped_like_title = strip_bullet(line).is_none()
        && split_heading(line).is_none()
        && !line.contains(':')
        && !line.ends_with(['.', '!', '?', ';'])
        && line.split_whitespace().count() <= 8
        && !contains_any(&lower, REQUIRED_CUES)
        && !contains_any(&lower, PREFERRED_CUES);
    if !shaped_like_title || qualification_re().is_match(line) {
        return false;
    }
    if contains_any(&lower, ROLE_NOUNS) {
        return true;
    }
    let has_dictionary_hit = dictionary
        .iter()
        .any(|entry| phrase_positions(&lower, entry).next().is_some());
    !has_dictionary_hit && !starts_with_action_verb(&lower)
}

/// Splits on `.`, `!`, `?`, `;` followed by whitespace or end of line, so "Node.js"
/// and "CI/CD" stay whole.
fn split_sentences(line: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = line.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?' | ';') {
            continue;
        }
        let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if at_boundary {
            let piece = line[start..pos].trim();
            if !piece.is_empty() {
                sentences.push(piece);
            }
            start = pos + c.len_utf8();
        }
    }
    let tail = line[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Recognizes "Requirements: ..." prefixes and standalone heading lines.
fn split_heading(sentence: &str) -> Option<(HeadingContext, &str)> {
    let (head, rest) = sentence.split_once(':').unwrap_or((sentence, ""));
    let normalized = head
        .trim()
        .trim_end_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    if normalized.split_whitespace().count() > 5 {
        return None;
    }
    HEADING_CUES
        .iter()
        .find(|(cue, _)| *cue == normalized)
        .map(|(_, context)| (*context, rest))
}

// ────────────────────────────────────────────────────────────────────────────
// Classification
// ────────────────────────────────────────────────────────────────────────────

/// Cue precedence: the unit's own preferred/required wording, then a preferred heading,
/// then degree/years patterns, then any other heading, then a leading action verb.
/// Uncued units survive only when they name a known skill.
fn classify(
    unit: &str,
    context: Option<HeadingContext>,
    has_dictionary_hit: bool,
) -> Option<RequirementKind> {
    let lower = unit.to_ascii_lowercase();

    if contains_any(&lower, PREFERRED_CUES) {
        return Some(RequirementKind::PreferredSkill);
    }
    if contains_any(&lower, REQUIRED_CUES) {
        return Some(RequirementKind::RequiredSkill);
    }
    if context == Some(HeadingContext::Kind(RequirementKind::PreferredSkill)) {
        return Some(RequirementKind::PreferredSkill);
    }
    if qualification_re().is_match(unit) {
        return Some(RequirementKind::Qualification);
    }
    if let Some(HeadingContext::Kind(kind)) = context {
        return Some(kind);
    }
    if starts_with_action_verb(&lower) {
        return Some(RequirementKind::Responsibility);
    }
    if has_dictionary_hit {
        return Some(RequirementKind::PreferredSkill);
    }
    None
}

fn starts_with_action_verb(lower: &str) -> bool {
    let mut text = lower.trim_start();
    for prefix in DUTY_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest;
            break;
        }
    }
    let word: String = text
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if word.is_empty() {
        return false;
    }

    let is_verb = |w: &str| ACTION_VERBS.contains(&w);
    is_verb(&word)
        || word.strip_suffix('s').is_some_and(is_verb)
        || word.strip_suffix("es").is_some_and(is_verb)
        || word.strip_suffix("ing").is_some_and(|stem| {
            is_verb(stem) || is_verb(&format!("{stem}e"))
        })
}

// ────────────────────────────────────────────────────────────────────────────
// Phrase extraction
// ────────────────────────────────────────────────────────────────────────────

/// Dictionary hits (longest first, non-overlapping) plus runs of capitalized or
/// tech-looking tokens that are not sentence-initial. Returned in text order.
fn extract_phrases(unit: &str, dictionary: &[String]) -> Vec<Phrase> {
    // ASCII lowercasing keeps byte offsets aligned with `unit`.
    let lower = unit.to_ascii_lowercase();
    let mut spans: Vec<(usize, usize, bool)> = Vec::new();

    for entry in dictionary {
        for start in phrase_positions(&lower, entry) {
            let end = start + entry.len();
            if !overlaps(&spans, start, end) {
                spans.push((start, end, true));
            }
        }
    }

    let tokens = tokenize(unit);
    let mut group: Option<(usize, usize)> = None;
    for (i, &(start, end)) in tokens.iter().enumerate() {
        let qualifies =
            i > 0 && is_skill_token(&unit[start..end]) && !overlaps(&spans, start, end);
        if !qualifies {
            if let Some((s, e)) = group.take() {
                spans.push((s, e, false));
            }
            continue;
        }
        group = match group {
            Some((s, e)) if unit[e..start].trim().is_empty() => Some((s, end)),
            Some((s, e)) => {
                spans.push((s, e, false));
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((s, e)) = group {
        spans.push((s, e, false));
    }

    spans.sort_by_key(|&(start, _, _)| start);
    spans
        .into_iter()
        .map(|(start, end, from_dictionary)| Phrase {
            text: unit[start..end].to_string(),
            from_dictionary,
        })
        .collect()
}

fn overlaps(spans: &[(usize, usize, bool)], start: usize, end: usize) -> bool {
    spans.iter().any(|&(s, e, _)| start < e && s < end)
}

/// Byte spans of tokens, split on whitespace and list punctuation, with quotes,
/// trailing periods and possessives trimmed.
fn tokenize(unit: &str) -> Vec<(usize, usize)> {
    const DELIMITERS: &[char] = &[',', ';', ':', '(', ')', '[', ']', '!', '?', '&'];
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in unit.char_indices() {
        if c.is_whitespace() || DELIMITERS.contains(&c) {
            if let Some(s) = start.take() {
                push_trimmed(unit, s, i, &mut spans);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        push_trimmed(unit, s, unit.len(), &mut spans);
    }
    spans
}

fn push_trimmed(unit: &str, start: usize, end: usize, spans: &mut Vec<(usize, usize)>) {
    const TRIM: &[char] = &['.', '\'', '"', '’', '‘', '“', '”', '*'];
    let token = &unit[start..end];
    let leading = token.len() - token.trim_start_matches(TRIM).len();
    let mut trimmed = token.trim_matches(TRIM);
    for suffix in ["'s", "’s"] {
        if let Some(stem) = trimmed.strip_suffix(suffix) {
            trimmed = stem;
        }
    }
    if !trimmed.is_empty() {
        let s = start + leading;
        spans.push((s, s + trimmed.len()));
    }
}

fn is_skill_token(token: &str) -> bool {
    if token.chars().count() < 2 || !token.chars().any(char::is_alphabetic) {
        return false;
    }
    if STOPWORDS.contains(&token.to_lowercase().as_str()) {
        return false;
    }
    let capitalized = token.chars().next().is_some_and(char::is_uppercase);
    let techy = token.contains(['+', '#']) || (token.contains('.') && !token.ends_with('.'));
    capitalized || techy
}

fn clean_unit(unit: &str) -> String {
    unit.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '+' && c != '#')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ────────────────────────────────────────────────────────────────────────────
// Word-boundary phrase search
// ────────────────────────────────────────────────────────────────────────────

/// Start offsets of `phrase` in `haystack` (both lowercased) at word boundaries.
fn phrase_positions<'a>(haystack: &'a str, phrase: &'a str) -> impl Iterator<Item = usize> + 'a {
    haystack
        .match_indices(phrase)
        .map(|(i, _)| i)
        .filter(move |&i| {
            let before = haystack[..i].chars().next_back();
            let after = haystack[i + phrase.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
}

fn count_occurrences(haystack: &str, phrase: &str) -> usize {
    if phrase.is_empty() {
        return 0;
    }
    phrase_positions(haystack, phrase).count()
}

fn contains_any(lower: &str, cues: &[&str]) -> bool {
    cues.iter().any(|cue| count_occurrences(lower, cue) > 0)
}

fn qualification_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b\d+\s*\+?\s*(?:-\s*\d+\s*)?(?:years?|yrs?)\b|\b(?:bachelor|master|ph\.?\s?d|doctorate|degree|mba|diploma|certified|certification)",
        )
        .expect("static regex")
    })
}

fn years_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2})\s*\+?\s*(?:-\s*\d{1,2}\s*)?(?:years?|yrs?)\b")
            .expect("static regex")
    })
}
