//! Debate records.
//!
//! A debate pairs the user against the AI on a topic; the AI always argues
//! the opposite side.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::DebateError;
use crate::evaluation::{EvaluationReport, parse_evaluation};
use crate::transcript::{Speaker, Transcript};

/// Side of the motion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    For,
    Against,
}

impl Position {
    pub fn opposite(self) -> Self {
        match self {
            Position::For => Position::Against,
            Position::Against => Position::For,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Position::For => "FOR",
            Position::Against => "AGAINST",
        }
    }

    /// Phrase used inside prompts, e.g. "arguing the FOR position".
    pub fn as_str(&self) -> &str {
        match self {
            Position::For => "for",
            Position::Against => "against",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "for" => Ok(Position::For),
            "against" => Ok(Position::Against),
            other => Err(format!("position must be 'for' or 'against', got '{}'", other)),
        }
    }
}

/// Who opens the debate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FirstSpeaker {
    User,
    Ai,
}

impl FromStr for FirstSpeaker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" | "me" => Ok(FirstSpeaker::User),
            "ai" => Ok(FirstSpeaker::Ai),
            other => Err(format!("first speaker must be 'user' or 'ai', got '{}'", other)),
        }
    }
}

/// A practice debate.
#[derive(Debug, Clone, PartialEq)]
pub struct Debate {
    pub id: Uuid,
    pub topic: String,
    user_position: Position,
    pub created_at: DateTime<Utc>,
    pub transcript: Transcript,
    pub evaluation: Option<EvaluationReport>,
}

impl Debate {
    pub fn new(topic: impl Into<String>, user_position: Position) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            user_position,
            created_at: Utc::now(),
            transcript: Transcript::new(),
            evaluation: None,
        }
    }

    pub fn user_position(&self) -> Position {
        self.user_position
    }

    pub fn ai_position(&self) -> Position {
        self.user_position.opposite()
    }

    /// Number of arguments the user has made so far.
    pub fn user_turns(&self) -> usize {
        self.transcript
            .turns()
            .iter()
            .filter(|t| t.speaker == Speaker::User)
            .count()
    }

    pub fn to_record(&self) -> Result<DebateRecord, DebateError> {
        let transcript = String::from_utf8(self.transcript.serialize()?)
            .map_err(|e| DebateError::StorageError(format!("Transcript is not UTF-8: {}", e)))?;
        let evaluation = self
            .evaluation
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        Ok(DebateRecord {
            id: self.id,
            topic: self.topic.clone(),
            user_position: self.user_position,
            ai_position: self.ai_position(),
            created_at: self.created_at,
            transcript,
            evaluation,
        })
    }

    pub fn from_record(record: DebateRecord) -> Result<Self, DebateError> {
        if record.ai_position != record.user_position.opposite() {
            warn!(
                id = %record.id,
                "stored ai position does not oppose the user; using the opposite of the user"
            );
        }

        let transcript = if record.transcript.trim().is_empty() {
            Transcript::new()
        } else {
            Transcript::deserialize(record.transcript.as_bytes())?
        };

        Ok(Self {
            id: record.id,
            topic: record.topic,
            user_position: record.user_position,
            created_at: record.created_at,
            transcript,
            evaluation: record.evaluation.as_ref().map(parse_evaluation),
        })
    }
}

/// Storage shape of a debate: scalar columns plus text blobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateRecord {
    pub id: Uuid,
    pub topic: String,
    pub user_position: Position,
    pub ai_position: Position,
    pub created_at: DateTime<Utc>,
    /// Serialized [`Transcript`].
    pub transcript: String,
    /// Serialized [`EvaluationReport`], or raw critique text.
    #[serde(default)]
    pub evaluation: Option<String>,
}
