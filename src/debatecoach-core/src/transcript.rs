//! Turn and transcript model.
//!
//! A transcript is an append-only, insertion-ordered list of turns. It is
//! stored as a single JSON blob and always read back whole.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DebateError;

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Ai,
}

impl Speaker {
    pub fn display_name(&self) -> &str {
        match self {
            Speaker::User => "USER",
            Speaker::Ai => "AI",
        }
    }
}

/// One speaker's contribution to a debate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    /// Path of the rendered speech for this turn, if any.
    #[serde(rename = "audio", default, skip_serializing_if = "Option::is_none")]
    pub audio_reference: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Ordered turns of a single debate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn stamped with the current time and return it.
    ///
    /// Timestamps strictly increase: when the clock has not moved past the
    /// previous turn, the new turn is placed one microsecond after it.
    pub fn append(
        &mut self,
        speaker: Speaker,
        text: impl Into<String>,
        audio_reference: Option<String>,
    ) -> &Turn {
        let now = Utc::now();
        let timestamp = match self.turns.last() {
            Some(last) if now <= last.timestamp => last.timestamp + Duration::microseconds(1),
            _ => now,
        };

        self.turns.push(Turn {
            speaker,
            text: text.into(),
            audio_reference,
            timestamp,
        });
        &self.turns[self.turns.len() - 1]
    }

    /// By-value form of [`Transcript::append`].
    pub fn append_turn(
        mut self,
        speaker: Speaker,
        text: impl Into<String>,
        audio_reference: Option<String>,
    ) -> Self {
        self.append(speaker, text, audio_reference);
        self
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Texts of every turn spoken by `speaker`, in order.
    pub fn texts_by(&self, speaker: Speaker) -> Vec<&str> {
        self.turns
            .iter()
            .filter(|t| t.speaker == speaker)
            .map(|t| t.text.as_str())
            .collect()
    }

    pub fn serialize(&self) -> Result<Vec<u8>, DebateError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, DebateError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_transcript_round_trip() {
        let transcript = Transcript::new();
        let bytes = transcript.serialize().unwrap();
        assert_eq!(bytes, b"[]");
        assert_eq!(Transcript::deserialize(&bytes).unwrap(), transcript);
    }

    #[test]
    fn test_appended_turns_keep_call_order() {
        let texts = ["first", "second", "third", "fourth", "fifth"];
        let mut transcript = Transcript::new();
        for (i, text) in texts.iter().enumerate() {
            let speaker = if i % 2 == 0 { Speaker::User } else { Speaker::Ai };
            transcript.append(speaker, *text, None);
        }

        let restored = Transcript::deserialize(&transcript.serialize().unwrap()).unwrap();
        assert_eq!(restored.len(), texts.len());
        let restored_texts: Vec<&str> = restored.turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(restored_texts, texts);
        assert_eq!(restored, transcript);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut transcript = Transcript::new();
        for _ in 0..50 {
            transcript.append(Speaker::User, "x", None);
        }
        for pair in transcript.turns().windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[test]
    fn test_audio_reference_serialized_as_audio() {
        let transcript = Transcript::new()
            .append_turn(Speaker::User, "We should.", None)
            .append_turn(Speaker::Ai, "We should not.", Some("audio/tts_1.wav".to_string()));

        let json: serde_json::Value =
            serde_json::from_slice(&transcript.serialize().unwrap()).unwrap();
        assert_eq!(json[0]["speaker"], "user");
        assert!(json[0].get("audio").is_none());
        assert_eq!(json[1]["speaker"], "ai");
        assert_eq!(json[1]["audio"], "audio/tts_1.wav");

        let restored = Transcript::deserialize(&transcript.serialize().unwrap()).unwrap();
        assert_eq!(restored, transcript);
    }

    #[test]
    fn test_recent_and_texts_by() {
        let transcript = Transcript::new()
            .append_turn(Speaker::Ai, "a1", None)
            .append_turn(Speaker::User, "u1", None)
            .append_turn(Speaker::Ai, "a2", None)
            .append_turn(Speaker::User, "u2", None);

        assert_eq!(transcript.recent(2)[0].text, "a2");
        assert_eq!(transcript.recent(10).len(), 4);
        assert_eq!(transcript.texts_by(Speaker::User), vec!["u1", "u2"]);
    }

    #[test]
    fn test_deserialize_rejects_unknown_speaker() {
        let blob = br#"[{"speaker":"moderator","text":"hi","timestamp":"2024-01-01T00:00:00Z"}]"#;
        assert!(Transcript::deserialize(blob).is_err());
    }
}
