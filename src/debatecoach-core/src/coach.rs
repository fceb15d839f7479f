//! Debate session flow.
//!
//! Ties the transcript, prompts, backend, speech and store together:
//! start a debate, take the user's arguments, reply as the AI, and judge
//! the user's performance on request.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::TextBackend;
use crate::config::{Config, DebateSettings, GenerationConfig};
use crate::debate::{Debate, FirstSpeaker, Position};
use crate::error::DebateError;
use crate::evaluation::{EvaluationReport, parse_evaluation};
use crate::prompts::{debate_prompt, evaluation_prompt};
use crate::store::DebateStore;
use crate::transcript::{Speaker, Turn};
use crate::tts::{SpeechSynthesizer, render_bounded};

/// Callback for coach events.
pub type CoachCallback = Box<dyn Fn(CoachEvent) + Send + Sync>;

/// Events emitted during a session.
#[derive(Debug, Clone)]
pub enum CoachEvent {
    /// A debate was created.
    DebateStarted {
        id: Uuid,
        topic: String,
        user_position: Position,
    },
    /// The AI is composing a reply.
    AiThinking,
    /// The AI replied.
    AiReply { text: String, audio: Option<String> },
    /// The user's performance is being judged.
    Evaluating { user_arguments: usize },
    /// A new evaluation was attached to the debate.
    EvaluationReady { score: u32 },
}

/// Runs practice debates between the user and the AI.
pub struct DebateCoach {
    backend: Arc<dyn TextBackend>,
    store: Arc<dyn DebateStore>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    speech_timeout: Duration,
    generation: GenerationConfig,
    settings: DebateSettings,
    callback: Option<CoachCallback>,
}

impl DebateCoach {
    /// Create a coach without speech.
    pub fn new(config: &Config, backend: Arc<dyn TextBackend>, store: Arc<dyn DebateStore>) -> Self {
        Self {
            backend,
            store,
            speech: None,
            speech_timeout: config.speech.timeout(),
            generation: config.generation.clone(),
            settings: config.debate.clone(),
            callback: None,
        }
    }

    /// Render AI turns to audio with `speech`.
    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    /// Override how long a turn waits for its audio.
    pub fn with_speech_timeout(mut self, timeout: Duration) -> Self {
        self.speech_timeout = timeout;
        self
    }

    /// Set a callback for coach events.
    pub fn with_callback(mut self, callback: CoachCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Start a debate. When the AI speaks first its opening turn is
    /// generated before the debate is saved.
    pub async fn start_debate(
        &self,
        topic: &str,
        user_position: Position,
        first_speaker: FirstSpeaker,
    ) -> Result<Debate, DebateError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(DebateError::InvalidInput("a debate topic is required".to_string()));
        }

        let mut debate = Debate::new(topic, user_position);
        info!(id = %debate.id, topic, position = %user_position, "debate started");
        self.emit_event(CoachEvent::DebateStarted {
            id: debate.id,
            topic: debate.topic.clone(),
            user_position,
        });

        if first_speaker == FirstSpeaker::Ai {
            let (text, audio) = self.ai_reply(&debate).await;
            debate.transcript.append(Speaker::Ai, text, audio);
        }

        self.save(&debate).await?;
        Ok(debate)
    }

    /// Add the user's argument and the AI's reply to a debate, returning
    /// the AI turn.
    pub async fn submit_argument(&self, id: Uuid, argument: &str) -> Result<Turn, DebateError> {
        let argument = argument.trim();
        if argument.is_empty() {
            return Err(DebateError::InvalidInput("an argument is required".to_string()));
        }

        let mut debate = self.debate(id).await?;
        debate.transcript.append(Speaker::User, argument, None);

        let (text, audio) = self.ai_reply(&debate).await;
        let turn = debate.transcript.append(Speaker::Ai, text, audio).clone();

        self.save(&debate).await?;
        Ok(turn)
    }

    /// Judge the user's side of a debate.
    ///
    /// An existing report is returned as is unless `force` is set, in which
    /// case it is replaced by a fresh evaluation.
    pub async fn evaluate(&self, id: Uuid, force: bool) -> Result<EvaluationReport, DebateError> {
        let mut debate = self.debate(id).await?;
        if let (Some(report), false) = (&debate.evaluation, force) {
            return Ok(report.clone());
        }

        let user_arguments = debate.user_turns();
        if user_arguments == 0 {
            warn!(%id, "evaluating a debate with no user arguments");
        }
        self.emit_event(CoachEvent::Evaluating { user_arguments });

        let prompt = evaluation_prompt(&debate.topic, debate.user_position(), &debate.transcript);
        let raw = self.backend.generate(&prompt, &self.generation.evaluation).await?;

        let report = parse_evaluation(raw.as_str());
        if report.is_empty() {
            warn!(%id, "evaluation reply contained none of the expected sections");
        }

        debate.evaluation = Some(report.clone());
        self.save(&debate).await?;
        info!(%id, score = report.score, "debate evaluated");
        self.emit_event(CoachEvent::EvaluationReady {
            score: report.score,
        });
        Ok(report)
    }

    /// Load one debate.
    pub async fn debate(&self, id: Uuid) -> Result<Debate, DebateError> {
        let record = self.store.get(id).await?.ok_or(DebateError::NotFound(id))?;
        Debate::from_record(record)
    }

    /// All debates, newest first. Records that fail to decode are skipped.
    pub async fn debates(&self) -> Result<Vec<Debate>, DebateError> {
        let records = self.store.list().await?;
        Ok(records
            .into_iter()
            .filter_map(|record| {
                let id = record.id;
                Debate::from_record(record)
                    .map_err(|e| warn!(%id, error = %e, "skipping unreadable debate"))
                    .ok()
            })
            .collect())
    }

    /// Generate the AI's next turn. Never fails: backend errors fall back
    /// to a fixed reply and speech problems to no audio.
    async fn ai_reply(&self, debate: &Debate) -> (String, Option<String>) {
        self.emit_event(CoachEvent::AiThinking);

        let prompt = debate_prompt(
            &debate.topic,
            debate.ai_position(),
            &debate.transcript,
            self.settings.history_window,
        );
        let text = match self.backend.generate(&prompt, &self.generation.debate).await {
            Ok(text) => text,
            Err(e) if e.is_model_unavailable() => {
                warn!(id = %debate.id, error = %e, "backend model is unavailable");
                self.settings.model_unavailable_reply.clone()
            }
            Err(e) => {
                warn!(id = %debate.id, error = %e, "backend failed to produce a debate reply");
                self.settings.fallback_reply.clone()
            }
        };

        let audio = match &self.speech {
            Some(speech) => render_bounded(speech.as_ref(), &text, self.speech_timeout)
                .await
                .map(|path| path.display().to_string()),
            None => None,
        };

        self.emit_event(CoachEvent::AiReply {
            text: text.clone(),
            audio: audio.clone(),
        });
        (text, audio)
    }

    async fn save(&self, debate: &Debate) -> Result<(), DebateError> {
        self.store.put(&debate.to_record()?).await
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: CoachEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}
