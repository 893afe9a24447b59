use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // OpenAI
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_api_url: String,

    // ElevenLabs
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_api_url: String,
    pub elevenlabs_voice_id: String,

    // Translation cache
    pub use_real_translation: bool,
    pub translation_timeout_ms: u64,
    pub default_language: String,
    pub translation_logging: bool,
    /// Most texts accepted by one UI-text request
    pub max_batch_size: usize,

    // Server
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // OpenAI - a missing key only fails the requests that need it
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4.1-nano-2025-04-14".to_string()),
            openai_api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),

            // ElevenLabs
            elevenlabs_api_key: non_empty_var("ELEVENLABS_API_KEY"),
            elevenlabs_api_url: std::env::var("ELEVENLABS_API_URL")
                .unwrap_or_else(|_| "https://api.elevenlabs.io".to_string()),
            elevenlabs_voice_id: std::env::var("ELEVENLABS_VOICE_ID")
                .unwrap_or_else(|_| "JBFqnCBsd6RMkjVDRZzb".to_string()),

            // Translation cache
            use_real_translation: parse_bool_var("USE_REAL_TRANSLATION", true)?,
            translation_timeout_ms: std::env::var("TRANSLATION_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            default_language: std::env::var("DEFAULT_LANGUAGE")
                .unwrap_or_else(|_| "en".to_string()),
            translation_logging: parse_bool_var("TRANSLATION_LOGGING", true)?,
            max_batch_size: std::env::var("TRANSLATION_MAX_BATCH_SIZE")
                .ok()
                .map(|v| v.parse().context("TRANSLATION_MAX_BATCH_SIZE must be a number"))
                .transpose()?
                .filter(|size| *size > 0)
                .unwrap_or(10),

            // Server
            port: std::env::var("PORT")
                .ok()
                .map(|v| v.parse().context("PORT must be a valid port number"))
                .transpose()?
                .unwrap_or(3000),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool_var(name: &str, default: bool) -> Result<bool> {
    match std::env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("{} must be a boolean, got '{}'", name, other),
        },
        Err(_) => Ok(default),
    }
}
