//! DebateCoach CLI - Debate Practice Tool
//!
//! A command-line tool for practicing debates against an AI opponent and
//! getting a scored critique of your arguments afterwards.

mod render;

use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use debatecoach_core::{
    Config, DebateCoach, DebateError, FileStore, FirstSpeaker, KokoroSpeech, OpenAiBackend, Position,
    TextBackend,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "debatecoach",
    version,
    about = "Debate Practice Tool - Argue with an AI and get judged",
    long_about = "A CLI tool for practicing debates against an AI opponent using OpenAI-compatible APIs, \
                  with optional spoken replies and a scored evaluation of your arguments."
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "DEBATECOACH_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Do not render AI replies to speech
    #[arg(long, global = true)]
    no_speech: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a debate and argue interactively
    Practice(StartArgs),

    /// Start a debate and print its id
    Start(StartArgs),

    /// Submit an argument to an existing debate
    Argue {
        /// Debate id
        id: Uuid,

        /// Your argument
        #[arg(required = true, num_args = 1.., value_name = "ARGUMENT")]
        argument: Vec<String>,
    },

    /// Judge your performance in a debate
    Evaluate {
        /// Debate id
        id: Uuid,

        /// Replace an existing evaluation
        #[arg(long)]
        force: bool,
    },

    /// List past debates, newest first
    List,

    /// Show a debate's transcript and evaluation
    Show {
        /// Debate id
        id: Uuid,
    },

    /// Check configuration, API key and storage
    Check {
        /// Also send a test prompt to the backend
        #[arg(long)]
        ping: bool,
    },
}

#[derive(Args)]
struct StartArgs {
    /// The topic to debate
    #[arg(value_name = "TOPIC")]
    topic: String,

    /// Your side of the motion (for or against)
    #[arg(short, long, default_value = "for", value_name = "POSITION")]
    position: Position,

    /// Who opens the debate (user or ai)
    #[arg(long, default_value = "user", value_name = "SPEAKER")]
    first_speaker: FirstSpeaker,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    if let Command::Check { ping } = cli.command {
        let ok = run_checks(&config, ping).await;
        std::process::exit(if ok { 0 } else { 1 });
    }

    let speaks = matches!(
        cli.command,
        Command::Practice(_) | Command::Start(_) | Command::Argue { .. }
    );
    let coach = build_coach(&config, speaks && !cli.no_speech).await?;

    match cli.command {
        Command::Practice(args) => practice(&coach, args).await?,
        Command::Start(args) => {
            let debate = coach
                .start_debate(&args.topic, args.position, args.first_speaker)
                .await?;
            println!(
                "Continue with: {}",
                format!("debatecoach argue {} \"<your argument>\"", debate.id).bright_white()
            );
        }
        Command::Argue { id, argument } => {
            coach.submit_argument(id, &argument.join(" ")).await?;
        }
        Command::Evaluate { id, force } => {
            let report = coach.evaluate(id, force).await?;
            render::print_report(&report);
        }
        Command::List => render::print_debate_list(&coach.debates().await?),
        Command::Show { id } => render::print_debate(&coach.debate(id).await?),
        Command::Check { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

async fn build_coach(
    config: &Config,
    with_speech: bool,
) -> Result<DebateCoach, Box<dyn std::error::Error>> {
    if !config.backend.has_api_key() {
        eprintln!(
            "{}",
            "Warning: GEMINI_API_KEY / OPENAI_API_KEY not set. API calls may fail.".yellow()
        );
    }

    let backend = Arc::new(OpenAiBackend::new(&config.backend)?);
    let store = Arc::new(FileStore::open(&config.storage.data_dir).await?);
    let coach = DebateCoach::new(config, backend, store)
        .with_callback(render::create_console_callback());

    if !(with_speech && config.speech.enabled) {
        return Ok(coach);
    }

    match KokoroSpeech::spawn(&config.speech).await {
        Ok(speech) => Ok(coach.with_speech(Arc::new(speech))),
        Err(e) => {
            warn!(error = %e, "speech disabled");
            eprintln!(
                "{}",
                format!("Warning: speech unavailable, continuing with text only ({}).", e).yellow()
            );
            Ok(coach)
        }
    }
}

/// Interactive session: start a debate, then read arguments from stdin.
async fn practice(coach: &DebateCoach, args: StartArgs) -> Result<(), Box<dyn std::error::Error>> {
    let debate = coach
        .start_debate(&args.topic, args.position, args.first_speaker)
        .await?;
    println!(
        "{}",
        "Type your argument and press Enter. Commands: /evaluate, /show, /quit".dimmed()
    );
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "you>".bright_green().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if practice_step(coach, debate.id, &line).await == Step::Finish {
            break;
        }
    }

    println!();
    println!(
        "{} {}",
        "Debate saved:".bold(),
        format!("debatecoach show {}", debate.id).bright_white()
    );
    Ok(())
}

/// What the practice loop does after handling a line.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Finish,
}

/// Handle one line of the practice session. Failures are reported and the
/// session goes on; only `/quit` and a completed `/evaluate` end it.
async fn practice_step(coach: &DebateCoach, id: Uuid, line: &str) -> Step {
    match line.trim() {
        "" => Step::Continue,
        "/quit" | "/exit" => Step::Finish,
        "/show" => {
            match coach.debate(id).await {
                Ok(debate) => render::print_debate(&debate),
                Err(e) => print_error(&e),
            }
            Step::Continue
        }
        "/evaluate" => match coach.evaluate(id, true).await {
            Ok(report) => {
                render::print_report(&report);
                Step::Finish
            }
            Err(e) => {
                print_error(&e);
                eprintln!("{}", "Type /evaluate to try again.".dimmed());
                Step::Continue
            }
        },
        argument => {
            println!();
            if let Err(e) = coach.submit_argument(id, argument).await {
                print_error(&e);
            }
            Step::Continue
        }
    }
}

fn print_error(e: &DebateError) {
    eprintln!("{} {}", "Error:".red().bold(), e);
}

/// Print configuration diagnostics. Returns false if any check failed.
async fn run_checks(config: &Config, ping: bool) -> bool {
    println!("{}", "=== DebateCoach Configuration Check ===".bold());
    let mut all_passed = true;

    println!("  Backend:  {} ({})", config.backend.model, config.backend.api_base);
    if config.backend.has_api_key() {
        let prefix: String = config.backend.api_key.chars().take(5).collect();
        print_check(true, &format!("API key found, starting with: {}...", prefix));
    } else {
        print_check(false, "No API key found. Set GEMINI_API_KEY or OPENAI_API_KEY in .env");
        all_passed = false;
    }

    match FileStore::open(&config.storage.data_dir).await {
        Ok(store) => print_check(true, &format!("Storage ready at {}", store.dir().display())),
        Err(e) => {
            print_check(false, &e.to_string());
            all_passed = false;
        }
    }

    if config.speech.enabled {
        print_check(
            true,
            &format!(
                "Speech enabled: voice {}, {}s limit, audio in {}",
                config.speech.voice,
                config.speech.timeout_secs,
                config.speech.audio_dir.display()
            ),
        );
    } else {
        println!("  {} Speech disabled", "-".dimmed());
    }

    if ping {
        match OpenAiBackend::new(&config.backend) {
            Ok(backend) => {
                let reply = backend
                    .generate(
                        "Say hello and confirm you're working correctly",
                        &config.generation.debate,
                    )
                    .await;
                match reply {
                    Ok(text) => print_check(true, &format!("Backend replied: {}", text)),
                    Err(e) => {
                        print_check(false, &format!("Backend request failed: {}", e));
                        all_passed = false;
                    }
                }
            }
            Err(e) => {
                print_check(false, &e.to_string());
                all_passed = false;
            }
        }
    }

    println!();
    if all_passed {
        println!("{}", "✓ All checks passed!".bright_green().bold());
    } else {
        println!("{}", "✗ Some checks failed. Please fix the issues above.".red().bold());
    }
    all_passed
}

fn print_check(ok: bool, msg: &str) {
    if ok {
        println!("  {} {}", "✓".green().bold(), msg);
    } else {
        println!("  {} {}", "✗".red().bold(), msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use debatecoach_core::MemoryStore;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_practice_args() {
        let cli = Cli::try_parse_from([
            "debatecoach",
            "practice",
            "Should AI be open source?",
            "--position",
            "against",
            "--first-speaker",
            "ai",
        ])
        .unwrap();

        match cli.command {
            Command::Practice(args) => {
                assert_eq!(args.topic, "Should AI be open source?");
                assert_eq!(args.position, Position::Against);
                assert_eq!(args.first_speaker, FirstSpeaker::Ai);
            }
            _ => panic!("expected practice"),
        }
    }

    #[test]
    fn test_parse_argue_joins_words() {
        let id = Uuid::new_v4();
        let id_arg = id.to_string();
        let cli = Cli::try_parse_from([
            "debatecoach",
            "argue",
            id_arg.as_str(),
            "Taxes",
            "fund",
            "schools.",
        ])
        .unwrap();

        match cli.command {
            Command::Argue { id: parsed, argument } => {
                assert_eq!(parsed, id);
                assert_eq!(argument.join(" "), "Taxes fund schools.");
            }
            _ => panic!("expected argue"),
        }
    }

    struct FlakyJudge {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl TextBackend for FlakyJudge {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate(
            &self,
            _prompt: &str,
            _settings: &debatecoach_core::GenerationSettings,
        ) -> Result<String, DebateError> {
            if self.fail {
                Err(DebateError::EmptyResponse { attempts: 3 })
            } else {
                Ok("Score: 75/100\nFinal Remarks: Solid.".to_string())
            }
        }
    }

    async fn practice_coach(fail: bool) -> (DebateCoach, Uuid) {
        let coach = DebateCoach::new(
            &Config::default(),
            Arc::new(FlakyJudge { fail }),
            Arc::new(MemoryStore::new()),
        );
        let debate = coach
            .start_debate("Homework", Position::Against, FirstSpeaker::User)
            .await
            .unwrap();
        (coach, debate.id)
    }

    #[tokio::test]
    async fn test_failed_evaluate_keeps_session_open() {
        let (coach, id) = practice_coach(true).await;

        assert_eq!(practice_step(&coach, id, "/evaluate").await, Step::Continue);
        assert_eq!(practice_step(&coach, id, "More practice helps.").await, Step::Continue);
        assert_eq!(practice_step(&coach, Uuid::new_v4(), "/show").await, Step::Continue);
        assert_eq!(practice_step(&coach, id, " /quit ").await, Step::Finish);
    }

    #[tokio::test]
    async fn test_successful_evaluate_ends_session() {
        let (coach, id) = practice_coach(false).await;

        assert_eq!(practice_step(&coach, id, "   ").await, Step::Continue);
        assert_eq!(practice_step(&coach, id, "/evaluate").await, Step::Finish);
        assert_eq!(coach.debate(id).await.unwrap().evaluation.unwrap().score, 75);
    }

    #[test]
    fn test_rejects_bad_position() {
        assert!(Cli::try_parse_from(["debatecoach", "start", "Topic", "-p", "maybe"]).is_err());
    }
}
