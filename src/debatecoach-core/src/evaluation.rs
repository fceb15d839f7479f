//! Evaluation report and the best-effort parser that scrapes it out of the
//! backend's free-text critique.
//!
//! Each field is extracted independently from the same immutable input.
//! A missing or malformed section only resets that field to its default;
//! the parser itself never fails.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

static SCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Score:\s*([0-9]+)\s*/\s*100").expect("score pattern"));

// Non-greedy up to the first closing brace; nested objects are cut short.
static BREAKDOWN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Breakdown:\s*(\{.*?\})").expect("breakdown pattern"));

static SINGLE_QUOTED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'([^'"]*)'(\s*):"#).expect("quoted key pattern"));

static STRENGTHS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Strengths:(.*?)Improvements:").expect("strengths pattern"));

static IMPROVEMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Improvements:(.*?)Argument Analysis:").expect("improvements pattern")
});

static DASH_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*-[ \t]*(.*)$").expect("dash line pattern"));

static ARGUMENT_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+\.\s*Argument:").expect("argument start pattern"));

static ARGUMENT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)^[0-9]+\.\s*Argument:\s*["\u{201C}](.*?)["\u{201D}]\s*Feedback:(.*?)Suggestion:(.*)$"#,
    )
    .expect("argument block pattern")
});

const FINAL_REMARKS_LABEL: &str = "Final Remarks:";

/// Feedback on one of the user's arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgumentFeedback {
    pub excerpt: String,
    pub feedback: String,
    pub suggestion: String,
}

/// Structured projection of a judge's critique.
///
/// Every field may be empty; an empty field means the section was missing
/// or unreadable, not that the judge had nothing to say. The serde shape is
/// strict (all fields, nothing else) so that a stored report can be told
/// apart from raw critique text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluationReport {
    /// Overall score. Normally 0-100 but taken as written.
    pub score: u32,
    pub breakdown: BTreeMap<String, serde_json::Value>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub argument_analysis: Vec<ArgumentFeedback>,
    pub final_remarks: String,
}

impl EvaluationReport {
    /// True when no field carries any parsed content.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Input accepted by [`parse_evaluation`].
#[derive(Debug, Clone)]
pub enum EvaluationInput<'a> {
    /// Free text as returned by the backend, or a serialized report.
    Text(&'a str),
    /// A report that has already been parsed.
    Structured(EvaluationReport),
}

impl<'a> From<&'a str> for EvaluationInput<'a> {
    fn from(text: &'a str) -> Self {
        EvaluationInput::Text(text)
    }
}

impl<'a> From<&'a String> for EvaluationInput<'a> {
    fn from(text: &'a String) -> Self {
        EvaluationInput::Text(text.as_str())
    }
}

impl From<EvaluationReport> for EvaluationInput<'_> {
    fn from(report: EvaluationReport) -> Self {
        EvaluationInput::Structured(report)
    }
}

/// Parse an evaluation into a report.
///
/// Structured input, including text that is a serialized report, is
/// returned unchanged.
pub fn parse_evaluation<'a>(input: impl Into<EvaluationInput<'a>>) -> EvaluationReport {
    let text = match input.into() {
        EvaluationInput::Structured(report) => return report,
        EvaluationInput::Text(text) => text,
    };

    if let Some(report) = as_serialized_report(text) {
        return report;
    }

    EvaluationReport {
        score: extract_score(text),
        breakdown: extract_breakdown(text),
        strengths: extract_dash_list(text, &STRENGTHS, "Strengths"),
        improvements: extract_dash_list(text, &IMPROVEMENTS, "Improvements"),
        argument_analysis: extract_argument_analysis(text),
        final_remarks: extract_final_remarks(text),
    }
}

fn as_serialized_report(text: &str) -> Option<EvaluationReport> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

fn extract_score(text: &str) -> u32 {
    let Some(caps) = SCORE.captures(text) else {
        debug!("evaluation has no score line");
        return 0;
    };
    match caps[1].parse() {
        Ok(score) => score,
        Err(e) => {
            warn!(digits = &caps[1], error = %e, "unreadable evaluation score");
            0
        }
    }
}

fn extract_breakdown(text: &str) -> BTreeMap<String, serde_json::Value> {
    let Some(caps) = BREAKDOWN.captures(text) else {
        debug!("evaluation has no breakdown object");
        return BTreeMap::new();
    };
    let raw = &caps[1];

    if let Ok(map) = serde_json::from_str(raw) {
        return map;
    }

    let normalized = SINGLE_QUOTED_KEY.replace_all(raw, "\"$1\"$2:");
    match serde_json::from_str(&normalized) {
        Ok(map) => map,
        Err(e) => {
            warn!(breakdown = raw, error = %e, "malformed evaluation breakdown");
            BTreeMap::new()
        }
    }
}

fn extract_dash_list(text: &str, section: &Regex, label: &str) -> Vec<String> {
    let Some(caps) = section.captures(text) else {
        debug!(section = label, "evaluation section not found");
        return Vec::new();
    };

    DASH_LINE
        .captures_iter(&caps[1])
        .map(|line| line[1].trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn extract_argument_analysis(text: &str) -> Vec<ArgumentFeedback> {
    // Blocks quoted inside the final remarks are not analysis.
    let region = match text.find(FINAL_REMARKS_LABEL) {
        Some(pos) => &text[..pos],
        None => text,
    };
    let starts: Vec<usize> = ARGUMENT_START.find_iter(region).map(|m| m.start()).collect();
    if starts.is_empty() {
        debug!("evaluation has no argument analysis");
        return Vec::new();
    }

    let mut analysis = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(region.len());
        let block = &region[start..end];

        match ARGUMENT_BLOCK.captures(block) {
            Some(caps) => analysis.push(ArgumentFeedback {
                excerpt: caps[1].trim().to_string(),
                feedback: caps[2].trim().to_string(),
                suggestion: caps[3].trim().to_string(),
            }),
            None => warn!(block = block.trim(), "skipping malformed argument analysis block"),
        }
    }
    analysis
}

fn extract_final_remarks(text: &str) -> String {
    match text.find(FINAL_REMARKS_LABEL) {
        Some(pos) => text[pos + FINAL_REMARKS_LABEL.len()..].trim().to_string(),
        None => {
            debug!("evaluation has no final remarks");
            String::new()
        }
    }
}
