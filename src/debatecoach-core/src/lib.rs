//! DebateCoach Core Library
//!
//! Provides the debate transcript model, the evaluation report parser,
//! and the session flow for practicing debates against an AI opponent.

pub mod backend;
pub mod coach;
pub mod config;
pub mod debate;
pub mod error;
pub mod evaluation;
pub mod prompts;
pub mod store;
pub mod transcript;
pub mod tts;

pub use backend::{GenerationSettings, OpenAiBackend, TextBackend};
pub use coach::{CoachCallback, CoachEvent, DebateCoach};
pub use config::Config;
pub use debate::{Debate, DebateRecord, FirstSpeaker, Position};
pub use error::DebateError;
pub use evaluation::{ArgumentFeedback, EvaluationInput, EvaluationReport, parse_evaluation};
pub use store::{DebateStore, FileStore, MemoryStore};
pub use transcript::{Speaker, Transcript, Turn};
pub use tts::{KokoroSpeech, SpeechSynthesizer, render_bounded};
