//! Prompt construction for debate replies and performance evaluation.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::debate::Position;
use crate::transcript::{Speaker, Transcript, Turn};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z]+)\}").expect("placeholder pattern"));

/// Section labels the evaluation parser looks for. The evaluation prompt
/// must ask for every one of them.
pub const EVALUATION_LABELS: [&str; 6] = [
    "Score:",
    "Breakdown:",
    "Strengths:",
    "Improvements:",
    "Argument Analysis:",
    "Final Remarks:",
];

const DEBATE_TEMPLATE: &str = r#"[ROLE] You are a world-class debater arguing the {position} position.
[TOPIC] Debate topic: "{topic}"
[HISTORY] Previous arguments:
{history}

[TASK] Craft a compelling response that:
1. Directly addresses the last point made
2. Uses logical reasoning and evidence
3. Includes rhetorical techniques (anaphora, tricolon, etc.)
4. Maintains a passionate but professional tone
5. Is 2-3 sentences maximum

[RESPONSE]
"#;

const OPENING_HISTORY: &str = "(none yet - you are giving the opening argument)";

const EVALUATION_TEMPLATE: &str = r#"[ROLE] You are a professional debate judge analyzing a debate performance.
[CRITERIA] Evaluate based on:
- Logical consistency (30%)
- Evidence quality (25%)
- Rebuttal effectiveness (20%)
- Persuasiveness (15%)
- Rhetorical skill (10%)

[TASK] Provide:
1. Numerical score (0-100) with breakdown
2. Three specific strengths
3. Three actionable improvements
4. Analysis of 2 key arguments with suggestions
5. Overall remarks

[DEBATE TOPIC] {topic}
[DEBATER POSITION] {position}

[DEBATE TRANSCRIPT]
{arguments}

[RESPONSE FORMAT]
Score: [number]/100
Breakdown: [JSON object mapping each criterion to its points]
Strengths:
- [strength1]
- [strength2]
- [strength3]

Improvements:
- [improvement1]
- [improvement2]
- [improvement3]

Argument Analysis:
1. Argument: "[excerpt]"
   Feedback: [specific feedback]
   Suggestion: [specific suggestion]
2. Argument: "[excerpt]"
   Feedback: [specific feedback]
   Suggestion: [specific suggestion]

Final Remarks: [overall feedback]
"#;

/// Prompt asking the backend for the AI's next debate turn.
///
/// Only the last `history_window` turns are included.
pub fn debate_prompt(
    topic: &str,
    ai_position: Position,
    transcript: &Transcript,
    history_window: usize,
) -> String {
    let history = transcript.recent(history_window);
    let history = if history.is_empty() {
        OPENING_HISTORY.to_string()
    } else {
        format_history(history)
    };

    fill_template(
        DEBATE_TEMPLATE,
        &[
            ("position", ai_position.as_str()),
            ("topic", topic),
            ("history", history.as_str()),
        ],
    )
}

/// Prompt asking the backend to judge the user's side of the debate.
pub fn evaluation_prompt(topic: &str, user_position: Position, transcript: &Transcript) -> String {
    let user_arguments = transcript.texts_by(Speaker::User);
    let arguments =
        serde_json::to_string_pretty(&user_arguments).unwrap_or_else(|_| "[]".to_string());

    fill_template(
        EVALUATION_TEMPLATE,
        &[
            ("topic", topic),
            ("position", user_position.as_str()),
            ("arguments", arguments.as_str()),
        ],
    )
}

/// Substitute `{name}` placeholders in a single pass, so braces inside the
/// substituted values are never expanded. Unknown names are left as is.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Render turns as `SPEAKER: text` lines.
pub fn format_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.speaker.display_name(), t.text))
        .collect::<Vec<_>>()
        .join("\n")
}
