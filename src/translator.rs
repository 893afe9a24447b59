//! Chat-completion client used for UI translation and language detection.

use crate::config::Config;
use crate::error::UpstreamError;
use crate::i18n::{Language, LanguageRegistry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

const PROVIDER: &str = "OpenAI";

/// Something that can translate one UI string into a target language.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: Language) -> Result<String, UpstreamError>;
}

/// Something that can name the language a text is written in.
#[async_trait]
pub trait LanguageDetector: Send + Sync {
    /// Returns an ISO 639-1 code.
    async fn detect_language(&self, text: &str) -> Result<String, UpstreamError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

const UI_TRANSLATOR_SYSTEM_PROMPT: &str = "You are a professional translator specializing in user interface text for healthcare and caregiving applications. Provide accurate, culturally appropriate translations that maintain the tone and context of the original text.";

const FREE_TEXT_SYSTEM_PROMPT: &str =
    "You are a professional translator. Translate the given text accurately and naturally.";

const DETECTION_SYSTEM_PROMPT: &str =
    "You are a language detection expert. Return only the ISO 639-1 language code.";

/// Build the numbered prompt for a batch of UI strings
fn build_batch_prompt(texts: &[&str], target_language: &str) -> String {
    let numbered = texts
        .iter()
        .enumerate()
        .map(|(i, text)| format!("{}. {}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Translate the following UI text elements from a caregiving/healthcare mobile app to {}.

Context: These are user interface elements including buttons, labels, messages, and form text. Keep translations:
- Concise and appropriate for mobile UI
- Culturally appropriate and respectful
- Consistent in tone (professional but friendly)
- Preserve any formatting or special characters

Original texts:
{}

Instructions:
- Return ONLY the translations, one per line
- Maintain the exact same order (1, 2, 3...)
- Do not include numbers or additional text
- If a text should not be translated (like email addresses), return it unchanged"#,
        target_language, numbered
    )
}

/// Build the prompt for translating free text (user-entered comments, notes)
fn build_free_text_prompt(text: &str, source_language: &str, target_language: &str) -> String {
    format!(
        "Translate the following text from {} to {}.\nOnly return the translated text, nothing else. Do not add any explanations or additional text.\n\nText to translate: \"{}\"",
        source_language, target_language, text
    )
}

fn build_detection_prompt(text: &str) -> String {
    let registry = LanguageRegistry::get();
    let languages = registry.list_enabled();

    let codes = languages
        .iter()
        .map(|lang| format!("'{}'", lang.code))
        .collect::<Vec<_>>()
        .join(", ");
    let listing = languages
        .iter()
        .map(|lang| format!("- {} ({})", lang.code, lang.openai_name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Detect the language of the following text and return only the ISO 639-1 language code (e.g., {}). If the language is not one of these, return '{}' as default.\n\nAvailable language codes:\n{}\n\nText to detect: \"{}\"",
        codes,
        registry.canonical().code,
        listing,
        text
    )
}

fn numbering_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"^\d+\.\s*").expect("numbering pattern is valid"))
}

fn strip_numbering(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|line| numbering_pattern().replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Split a batch answer back into one translation per input text.
///
/// `1.`-style numbering is removed when every line carries it, or when the
/// raw line count is off. Missing entries are padded with the corresponding
/// original text.
pub fn parse_translation_response(response: &str, originals: &[&str]) -> Vec<String> {
    let expected = originals.len();
    let mut lines: Vec<String> = response
        .trim()
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    if !lines.is_empty() && lines.iter().all(|line| numbering_pattern().is_match(line)) {
        lines = strip_numbering(&lines);
    }

    if lines.len() == expected {
        return lines;
    }

    let unnumbered = strip_numbering(&lines);

    if unnumbered.len() == expected {
        return unnumbered;
    }

    warn!(
        "Expected {} translations, got {}. Response: {}",
        expected,
        lines.len(),
        response
    );

    let mut result = lines;
    result.truncate(expected);
    while result.len() < expected {
        result.push(originals[result.len()].to_string());
    }
    result
}

/// Normalise a model's language answer to a registered code.
fn normalize_language_code(raw: &str) -> String {
    let code = raw
        .trim()
        .trim_matches(|c: char| c == '\'' || c == '"' || c == '.' || c == '`')
        .to_lowercase();

    if LanguageRegistry::get().is_enabled(&code) {
        code
    } else {
        Language::canonical().code().to_string()
    }
}

/// OpenAI chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    api_url: String,
}

impl OpenAiClient {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            api_url: config.openai_api_url.clone(),
        }
    }

    /// Build a client with its own HTTP pool and the configured timeout.
    pub fn from_config(config: &Config) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.translation_timeout_ms))
            .build()?;
        Ok(Self::new(client, config))
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Translate several UI strings in one call, preserving order.
    pub async fn translate_batch(
        &self,
        texts: &[&str],
        target: Language,
    ) -> Result<Vec<String>, UpstreamError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = build_batch_prompt(texts, target.openai_name());
        let answer = self
            .complete(UI_TRANSLATOR_SYSTEM_PROMPT, prompt, Some(0.1), 2000)
            .await?;

        debug!("OpenAI raw batch response: {}", answer);
        Ok(parse_translation_response(&answer, texts))
    }

    /// Translate user-entered text between two named languages.
    pub async fn translate_text(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, UpstreamError> {
        if text.trim().is_empty() {
            return Err(UpstreamError::InvalidInput(
                "Source text cannot be empty".to_string(),
            ));
        }

        let prompt = build_free_text_prompt(text, source_language, target_language);
        self.complete(FREE_TEXT_SYSTEM_PROMPT, prompt, Some(0.3), 1000)
            .await
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: String,
        temperature: Option<f32>,
        max_tokens: u32,
    ) -> Result<String, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingApiKey { provider: PROVIDER })?;

        // Reasoning models need higher token limits and don't support temperature
        let is_reasoning = is_reasoning_model(&self.model);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_prompt,
                },
            ],
            max_completion_tokens: if is_reasoning { 16000 } else { max_tokens },
            temperature: if is_reasoning { None } else { temperature },
            reasoning_effort: if is_reasoning {
                Some("low".to_string())
            } else {
                None
            },
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(UpstreamError::Api {
                provider: PROVIDER,
                status,
                body,
            });
        }

        let chat_response: ChatResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(UpstreamError::EmptyResponse { provider: PROVIDER })
    }
}

#[async_trait]
impl Translator for OpenAiClient {
    async fn translate(&self, text: &str, target: Language) -> Result<String, UpstreamError> {
        let mut translations = self.translate_batch(&[text], target).await?;
        Ok(translations.pop().unwrap_or_else(|| text.to_string()))
    }
}

#[async_trait]
impl LanguageDetector for OpenAiClient {
    async fn detect_language(&self, text: &str) -> Result<String, UpstreamError> {
        if text.trim().is_empty() {
            return Err(UpstreamError::InvalidInput(
                "Text cannot be empty".to_string(),
            ));
        }

        let answer = self
            .complete(DETECTION_SYSTEM_PROMPT, build_detection_prompt(text), Some(0.1), 10)
            .await?;
        Ok(normalize_language_code(&answer))
    }
}

/// Offline translator for development: tags text with the target code.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockTranslator;

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, target: Language) -> Result<String, UpstreamError> {
        Ok(format!("[{}] {}", target.code().to_uppercase(), text))
    }
}
