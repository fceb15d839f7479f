//! Console rendering for debates, turns and evaluation reports.

use colored::Colorize;
use debatecoach_core::{CoachEvent, Debate, EvaluationReport, Position, Speaker, Turn};
use uuid::Uuid;

const WIDTH: usize = 70;

pub fn rule() -> String {
    "═".repeat(WIDTH)
}

/// Print the debate banner.
pub fn print_header(debate: &Debate) {
    print_banner(debate.id, &debate.topic, debate.user_position());
}

fn print_banner(id: Uuid, topic: &str, user_position: Position) {
    println!();
    println!("{}", rule().bright_blue());
    println!("{}", "  DebateCoach - Practice Debate".bright_blue().bold());
    println!("{}", rule().bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), topic.bright_white());
    println!(
        "{} {}   {} {}",
        "You:".bold(),
        user_position.display_name().yellow(),
        "AI:".bold(),
        user_position.opposite().display_name().yellow()
    );
    println!("{} {}", "Debate ID:".bold(), id.to_string().dimmed());
    println!("{}", "─".repeat(WIDTH).dimmed());
    println!();
}

/// Print a single turn.
pub fn print_turn(turn: &Turn) {
    let label = match turn.speaker {
        Speaker::User => "You".bright_green().bold(),
        Speaker::Ai => "AI".bright_cyan().bold(),
    };
    println!(
        "{} {} {}",
        "▶".bright_cyan(),
        label,
        turn.timestamp.format("%H:%M:%S").to_string().dimmed()
    );
    print_wrapped(&turn.text);
    if let Some(audio) = &turn.audio_reference {
        println!("  {} {}", "♪".magenta(), audio.dimmed());
    }
    println!();
}

/// Print the whole debate: header, turns, and evaluation if present.
pub fn print_debate(debate: &Debate) {
    print_header(debate);
    if debate.transcript.is_empty() {
        println!("  {}", "No turns yet.".dimmed());
        println!();
    }
    for turn in debate.transcript.turns() {
        print_turn(turn);
    }
    if let Some(report) = &debate.evaluation {
        print_report(report);
    }
}

/// Print a one-line summary per debate.
pub fn print_debate_list(debates: &[Debate]) {
    if debates.is_empty() {
        println!("{}", "No debates yet. Start one with `debatecoach practice \"<topic>\"`.".dimmed());
        return;
    }
    for debate in debates {
        let score = match &debate.evaluation {
            Some(report) => format!("{:>3}/100", report.score).bright_green(),
            None => "  -    ".dimmed(),
        };
        println!(
            "{}  {}  {}  {:<8} {}",
            debate.id.to_string().dimmed(),
            debate.created_at.format("%Y-%m-%d %H:%M").to_string(),
            score,
            debate.user_position().display_name().yellow(),
            debate.topic.bright_white()
        );
    }
}

/// Print an evaluation report.
pub fn print_report(report: &EvaluationReport) {
    println!("{}", rule().bright_magenta());
    println!(
        "{}",
        format!("  EVALUATION  Score: {}/100", report.score)
            .bright_magenta()
            .bold()
    );
    println!("{}", rule().bright_magenta());

    if report.is_empty() {
        println!();
        println!(
            "  {}",
            "The judge's reply could not be read. Try `evaluate --force`.".yellow()
        );
        println!();
        return;
    }

    if !report.breakdown.is_empty() {
        println!();
        println!("{}", "Breakdown".bold());
        for (category, value) in &report.breakdown {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            println!("  {:<28} {}", category, value.bright_white());
        }
    }

    print_list("Strengths", &report.strengths, "+".green());
    print_list("Improvements", &report.improvements, "→".yellow());

    if !report.argument_analysis.is_empty() {
        println!();
        println!("{}", "Argument Analysis".bold());
        for (i, item) in report.argument_analysis.iter().enumerate() {
            println!("  {}. {}", i + 1, format!("\"{}\"", item.excerpt).italic());
            println!("     {} {}", "Feedback:".dimmed(), item.feedback);
            println!("     {} {}", "Suggestion:".dimmed(), item.suggestion);
        }
    }

    if !report.final_remarks.is_empty() {
        println!();
        println!("{}", "Final Remarks".bold());
        print_wrapped(&report.final_remarks);
    }
    println!();
}

fn print_list(title: &str, items: &[String], bullet: colored::ColoredString) {
    if items.is_empty() {
        return;
    }
    println!();
    println!("{}", title.bold());
    for item in items {
        println!("  {} {}", bullet, item);
    }
}

/// Print text wrapped and indented.
pub fn print_wrapped(text: &str) {
    for paragraph in text.lines() {
        for line in textwrap(paragraph, WIDTH - 4).lines() {
            println!("  {}", line);
        }
    }
}

/// Create a callback that prints coach events to the console.
pub fn create_console_callback() -> Box<dyn Fn(CoachEvent) + Send + Sync> {
    Box::new(move |event| match event {
        CoachEvent::DebateStarted {
            id,
            topic,
            user_position,
        } => print_banner(id, &topic, user_position),
        CoachEvent::AiThinking => {
            println!("{}", "  AI is preparing a response...".dimmed());
        }
        CoachEvent::AiReply { text, audio } => {
            println!("{} {}", "▶".bright_cyan(), "AI".bright_cyan().bold());
            print_wrapped(&text);
            if let Some(audio) = audio {
                println!("  {} {}", "♪".magenta(), audio.dimmed());
            }
            println!();
        }
        CoachEvent::Evaluating { user_arguments } => {
            println!(
                "{}",
                format!("  Judging your {} argument(s)...", user_arguments).dimmed()
            );
        }
        CoachEvent::EvaluationReady { .. } => {}
    })
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textwrap_breaks_on_width() {
        let wrapped = textwrap("one two three four five", 9);
        assert_eq!(wrapped, "one two\nthree\nfour five");
    }

    #[test]
    fn test_textwrap_keeps_long_words_whole() {
        assert_eq!(textwrap("incomprehensibilities", 5), "incomprehensibilities");
    }
}
