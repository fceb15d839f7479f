//! Generative-text backend.
//!
//! The coach talks to the backend only through [`TextBackend`]; the
//! production implementation speaks the OpenAI chat-completions protocol,
//! which Gemini, OpenAI and local servers such as Ollama all accept.

use std::sync::LazyLock;
use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::error::DebateError;

const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

const REASONING_TAGS: [&str; 15] = [
    "thinking",
    "think",
    "reflection",
    "reflect",
    "internal",
    "reasoning",
    "thought",
    "scratch",
    "scratchpad",
    "plan",
    "analysis",
    "analyze",
    "consider",
    "pondering",
    "deliberation",
];

// One pattern per tag; the regex crate has no backreferences.
static REASONING_BLOCKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    REASONING_TAGS
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag))
                .expect("reasoning tag pattern")
        })
        .collect()
});

static ORPHAN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][\w-]*[^>]*>").expect("orphan tag pattern"));

static INLINE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("whitespace pattern"));

/// Sampling settings passed through to the backend unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

/// Something that turns a prompt into text.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<String, DebateError>;
}

/// Backend speaking the OpenAI chat-completions API.
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model: String,
    max_retries: u32,
}

impl OpenAiBackend {
    /// Build a client from configuration. Does not contact the server.
    pub fn new(config: &BackendConfig) -> Result<Self, DebateError> {
        if !config.has_api_key() {
            warn!("no backend API key configured; requests will likely be rejected");
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| {
                DebateError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.api_base);

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http_client),
            model: config.model.clone(),
            max_retries: config.max_retries.max(1),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<String, DebateError> {
        let messages = vec![ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage {
                content: prompt.to_string().into(),
                name: None,
            },
        )];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(settings.temperature)
            .top_p(settings.top_p)
            .max_completion_tokens(settings.max_tokens)
            .messages(messages)
            .build()?;

        let client = &self.client;
        let model = self.model.as_str();
        let request = &request;
        retry_completion(self.max_retries, RETRY_BASE_DELAY, move || async move {
            info!(model, "sending prompt to backend");
            let response = client.chat().create(request.clone()).await?;
            Ok::<_, OpenAIError>(
                response
                    .choices
                    .first()
                    .and_then(|c| c.message.content.clone())
                    .unwrap_or_default(),
            )
        })
        .await
    }
}

/// Run `attempt_once` up to `max_retries` times with exponential backoff,
/// returning the first non-empty sanitized reply.
///
/// The error reported is the last attempt's: a request error if it failed,
/// [`DebateError::EmptyResponse`] if it came back empty.
async fn retry_completion<F, Fut>(
    max_retries: u32,
    base_delay: Duration,
    mut attempt_once: F,
) -> Result<String, DebateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, OpenAIError>>,
{
    let mut last_error = None;
    for attempt in 0..max_retries {
        if attempt > 0 {
            // 1s, 2s, 4s, ...
            let delay = base_delay * (1 << (attempt - 1).min(5));
            debug!(attempt, ?delay, "retrying backend request");
            tokio::time::sleep(delay).await;
        }

        match attempt_once().await {
            Ok(content) => {
                let cleaned = sanitize_response(&content);
                if !cleaned.is_empty() {
                    return Ok(cleaned);
                }
                warn!(attempt = attempt + 1, "backend returned an empty response");
                last_error = None;
            }
            Err(e) => {
                warn!(attempt = attempt + 1, error = %e, "backend request failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .map(DebateError::from)
        .unwrap_or(DebateError::EmptyResponse {
            attempts: max_retries,
        }))
}

/// Strip reasoning tags and markdown emphasis from a backend reply.
///
/// Removes blocks like `<thinking>...</thinking>` together with their
/// content, then any leftover tags and asterisks, and collapses runs of
/// spaces. Line breaks survive so labelled sections stay on their lines.
pub fn sanitize_response(response: &str) -> String {
    let mut result = response.to_string();

    for re in REASONING_BLOCKS.iter() {
        result = re.replace_all(&result, "").into_owned();
    }
    result = ORPHAN_TAG.replace_all(&result, "").into_owned();
    result = result.replace('*', "");
    result = INLINE_WHITESPACE.replace_all(&result, " ").into_owned();

    result
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_response_thinking_tags() {
        let input = "<thinking>Let me think about this...</thinking>The answer is 42.";
        assert_eq!(sanitize_response(input), "The answer is 42.");
    }

    #[test]
    fn test_sanitize_response_reflection_tags() {
        let input = "Hello <reflection>internal thought</reflection> world!";
        assert_eq!(sanitize_response(input), "Hello world!");
    }

    #[test]
    fn test_sanitize_response_multiline_tags() {
        let input = "<thinking>\nMultiple\nlines\nof\nthought\n</thinking>Final answer here.";
        assert_eq!(sanitize_response(input), "Final answer here.");
    }

    #[test]
    fn test_sanitize_response_keeps_evaluation_layout() {
        let input = "**Score:** 80/100\nStrengths:\n  - Clear   thesis\nFinal Remarks: Good.";
        assert_eq!(
            sanitize_response(input),
            "Score: 80/100\nStrengths:\n- Clear thesis\nFinal Remarks: Good."
        );
    }

    #[test]
    fn test_sanitize_response_keeps_comparisons() {
        let input = "Costs fell 3 < 5 percent.";
        assert_eq!(sanitize_response(input), "Costs fell 3 < 5 percent.");
    }

    #[test]
    fn test_sanitize_response_multiple_tag_types() {
        let input = "<plan>First plan</plan>Then <reasoning>reason</reasoning> finally the answer.";
        assert_eq!(sanitize_response(input), "Then finally the answer.");
    }

    fn scripted(
        replies: Vec<Result<&'static str, &'static str>>,
    ) -> impl FnMut() -> std::future::Ready<Result<String, OpenAIError>> {
        let mut replies = replies.into_iter();
        move || {
            let reply = match replies.next() {
                Some(Ok(text)) => Ok(text.to_string()),
                Some(Err(msg)) => Err(OpenAIError::InvalidArgument(msg.to_string())),
                None => Ok(String::new()),
            };
            std::future::ready(reply)
        }
    }

    #[tokio::test]
    async fn test_retry_returns_first_non_empty_reply() {
        let reply = retry_completion(
            3,
            Duration::ZERO,
            scripted(vec![Err("connection reset"), Ok("  "), Ok("<think>hm</think>Ready.")]),
        )
        .await
        .unwrap();
        assert_eq!(reply, "Ready.");
    }

    #[tokio::test]
    async fn test_retry_reports_last_request_error() {
        let err = retry_completion(
            2,
            Duration::ZERO,
            scripted(vec![Ok(""), Err("connection reset")]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DebateError::OpenAIError(_)));
    }

    #[tokio::test]
    async fn test_empty_last_attempt_overrides_earlier_error() {
        let err = retry_completion(
            2,
            Duration::ZERO,
            scripted(vec![Err("connection reset"), Ok("")]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DebateError::EmptyResponse { attempts: 2 }));
    }

    #[test]
    fn test_backend_builds_without_network() {
        let config = BackendConfig {
            api_key: "sk-test".to_string(),
            ..BackendConfig::default()
        };
        let backend = OpenAiBackend::new(&config).unwrap();
        assert_eq!(backend.model(), "gemini-2.0-flash");
        assert_eq!(backend.name(), "gemini-2.0-flash");
    }
}
