//! Configuration module for loading TOML config files.
//!
//! Every section has defaults, so a config file only needs the keys it
//! changes. Secrets never come from the file: the API key is read from the
//! environment by [`Config::apply_env`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::GenerationSettings;
use crate::error::DebateError;

/// Environment variables checked, in order, for the backend API key.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "OPENAI_API_KEY"];

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub generation: GenerationConfig,
    pub debate: DebateSettings,
    pub speech: SpeechConfig,
    pub storage: StorageConfig,
}

/// Connection settings for the OpenAI-compatible backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    pub api_base: String,
    pub model: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_retries: u32,
    #[serde(skip)]
    pub api_key: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "gemini-2.0-flash".to_string(),
            request_timeout_secs: 120,
            connect_timeout_secs: 30,
            max_retries: 3,
            api_key: String::new(),
        }
    }
}

impl BackendConfig {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Sampling settings per request kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub debate: GenerationSettings,
    pub evaluation: GenerationSettings,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            debate: GenerationSettings {
                temperature: 0.8,
                max_tokens: 200,
                top_p: 0.95,
            },
            evaluation: GenerationSettings {
                temperature: 0.3,
                max_tokens: 600,
                top_p: 0.95,
            },
        }
    }
}

/// Debate flow settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DebateSettings {
    /// How many recent turns the AI sees when replying.
    pub history_window: usize,
    /// Reply used when the backend cannot produce one.
    pub fallback_reply: String,
    /// Reply used when the backend rejects the configured model.
    pub model_unavailable_reply: String,
}

impl Default for DebateSettings {
    fn default() -> Self {
        Self {
            history_window: 4,
            fallback_reply: "I'm having trouble forming a response. Let's continue the debate \
                             when I'm feeling more articulate."
                .to_string(),
            model_unavailable_reply: "I'm having trouble accessing the AI model. Please check \
                                      that your API key has access to the specified model."
                .to_string(),
        }
    }
}

/// Text-to-speech settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    pub voice: String,
    /// Longest the debate waits for audio before moving on without it.
    pub timeout_secs: u64,
    pub audio_dir: PathBuf,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            voice: "af_sky".to_string(),
            timeout_secs: 10,
            audio_dir: PathBuf::from(".debatecoach/audio"),
        }
    }
}

impl SpeechConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where debate records live.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".debatecoach/debates"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::parse(&content)
    }

    /// Load configuration from string content.
    pub fn parse(content: &str) -> Result<Self, DebateError> {
        toml::from_str(content)
            .map_err(|e| DebateError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` to read variables.
    ///
    /// `DEBATECOACH_API_BASE` (or `OPENAI_API_BASE`) sets the endpoint,
    /// `DEBATE_MODEL` the model, and the first non-empty of
    /// [`API_KEY_VARS`] the API key.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base) = non_empty("DEBATECOACH_API_BASE").or_else(|| non_empty("OPENAI_API_BASE"))
        {
            self.backend.api_base = base;
        }
        if let Some(model) = non_empty("DEBATE_MODEL") {
            self.backend.model = model;
        }
        if let Some(key) = API_KEY_VARS.iter().find_map(|&var| non_empty(var)) {
            self.backend.api_key = key;
        }
    }

    /// Check the values that would otherwise fail late, mid-debate.
    pub fn validate(&self) -> Result<(), DebateError> {
        if self.backend.model.trim().is_empty() {
            return Err(DebateError::ConfigError("backend.model is empty".to_string()));
        }
        if self.debate.history_window == 0 {
            return Err(DebateError::ConfigError(
                "debate.history_window must be at least 1".to_string(),
            ));
        }
        for (name, settings) in [
            ("debate", &self.generation.debate),
            ("evaluation", &self.generation.evaluation),
        ] {
            if settings.max_tokens == 0 {
                return Err(DebateError::ConfigError(format!(
                    "generation.{}.max_tokens must be positive",
                    name
                )));
            }
        }
        if self.speech.enabled && self.speech.voice.trim().is_empty() {
            return Err(DebateError::ConfigError(
                "speech.voice is empty while speech is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
