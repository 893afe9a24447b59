//! ElevenLabs speech-to-text and text-to-speech.

use crate::config::Config;
use crate::error::UpstreamError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const PROVIDER: &str = "ElevenLabs";

/// Largest accepted recording (25 MiB).
pub const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

pub const SUPPORTED_AUDIO_TYPES: &[&str] = &[
    "audio/webm;codecs=opus",
    "audio/webm",
    "audio/mp4",
    "audio/wav",
    "audio/mpeg",
];

const TRANSCRIPTION_MODEL: &str = "scribe_v1";
const SPEECH_MODEL: &str = "eleven_multilingual_v2";
const SPEECH_FORMAT: &str = "mp3_44100_128";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AudioValidationError {
    #[error("Audio file too large. Maximum size is 25MB.")]
    TooLarge,

    #[error("Unsupported audio file format")]
    UnsupportedType,
}

/// A recording uploaded for transcription.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

impl AudioUpload {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            file_name: "recording.webm".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), AudioValidationError> {
        validate_audio(self.bytes.len(), &self.content_type)
    }
}

/// Check size and declared type of a recording.
pub fn validate_audio(size: usize, content_type: &str) -> Result<(), AudioValidationError> {
    if size > MAX_AUDIO_BYTES {
        return Err(AudioValidationError::TooLarge);
    }

    let normalized: String = content_type
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    if !SUPPORTED_AUDIO_TYPES.contains(&normalized.as_str()) {
        return Err(AudioValidationError::UnsupportedType);
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct ElevenLabsClient {
    client: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
    voice_id: String,
}

impl ElevenLabsClient {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            api_key: config.elevenlabs_api_key.clone(),
            api_url: config.elevenlabs_api_url.trim_end_matches('/').to_string(),
            voice_id: config.elevenlabs_voice_id.clone(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, UpstreamError> {
        self.api_key
            .as_deref()
            .ok_or(UpstreamError::MissingApiKey { provider: PROVIDER })
    }

    /// Transcribe a validated recording; an empty transcript is not an error.
    pub async fn transcribe(&self, audio: AudioUpload) -> Result<String, UpstreamError> {
        let api_key = self.api_key()?;

        let file = Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(&audio.content_type)?;
        let form = Form::new()
            .part("file", file)
            .text("model_id", TRANSCRIPTION_MODEL)
            .text("tag_audio_events", "false")
            .text("diarize", "false");

        let response = self
            .client
            .post(format!("{}/v1/speech-to-text", self.api_url))
            .header("xi-api-key", api_key)
            .multipart(form)
            .send()
            .await?;

        let response = check_status(response).await?;
        let transcription: TranscriptionResponse = response.json().await?;
        Ok(transcription.text.unwrap_or_default())
    }

    /// Synthesize `text` and return it as an mp3 data URL.
    pub async fn text_to_speech(&self, text: &str) -> Result<String, UpstreamError> {
        let api_key = self.api_key()?;
        if text.trim().is_empty() {
            return Err(UpstreamError::InvalidInput(
                "Text cannot be empty".to_string(),
            ));
        }

        let response = self
            .client
            .post(format!(
                "{}/v1/text-to-speech/{}",
                self.api_url, self.voice_id
            ))
            .query(&[("output_format", SPEECH_FORMAT)])
            .header("xi-api-key", api_key)
            .json(&SpeechRequest {
                text,
                model_id: SPEECH_MODEL,
            })
            .send()
            .await?;

        let response = check_status(response).await?;
        let audio = response.bytes().await?;
        debug!("Synthesized {} bytes of audio", audio.len());

        Ok(format!("data:audio/mp3;base64,{}", STANDARD.encode(&audio)))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
    Err(UpstreamError::Api {
        provider: PROVIDER,
        status,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn create_test_config(api_url: &str) -> Config {
        Config {
            openai_api_key: None,
            openai_model: "gpt-4.1-nano-2025-04-14".to_string(),
            openai_api_url: "http://localhost".to_string(),
            elevenlabs_api_key: Some("test-eleven-key".to_string()),
            elevenlabs_api_url: api_url.to_string(),
            elevenlabs_voice_id: "test-voice".to_string(),
            use_real_translation: true,
            translation_timeout_ms: 5_000,
            default_language: "en".to_string(),
            translation_logging: true,
            max_batch_size: 10,
            port: 3000,
        }
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_validate_supported_types() {
        for content_type in SUPPORTED_AUDIO_TYPES {
            assert_eq!(validate_audio(1024, content_type), Ok(()));
        }
    }

    #[test]
    fn test_validate_codec_parameter_with_space() {
        assert_eq!(validate_audio(10, "audio/webm; codecs=opus"), Ok(()));
    }

    #[test]
    fn test_validate_rejects_unsupported_type() {
        assert_eq!(
            validate_audio(10, "audio/ogg"),
            Err(AudioValidationError::UnsupportedType)
        );
        assert_eq!(
            validate_audio(10, ""),
            Err(AudioValidationError::UnsupportedType)
        );
    }

    #[test]
    fn test_validate_size_limit() {
        assert_eq!(validate_audio(MAX_AUDIO_BYTES, "audio/wav"), Ok(()));
        assert_eq!(
            validate_audio(MAX_AUDIO_BYTES + 1, "audio/wav"),
            Err(AudioValidationError::TooLarge)
        );
    }

    // ==================== Client Tests ====================

    #[tokio::test]
    async fn test_transcribe() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/speech-to-text"))
            .and(header("xi-api-key", "test-eleven-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "text": "Give grandma her pills" })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ElevenLabsClient::new(reqwest::Client::new(), &create_test_config(&mock_server.uri()));
        let text = client
            .transcribe(AudioUpload::new(vec![1, 2, 3], "audio/webm"))
            .await
            .unwrap();

        assert_eq!(text, "Give grandma her pills");
    }

    #[tokio::test]
    async fn test_transcribe_missing_text_is_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/speech-to-text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&mock_server)
            .await;

        let client = ElevenLabsClient::new(reqwest::Client::new(), &create_test_config(&mock_server.uri()));
        let text = client
            .transcribe(AudioUpload::new(vec![0; 16], "audio/wav"))
            .await
            .unwrap();

        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_text_to_speech_returns_data_url() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/test-voice"))
            .and(query_param("output_format", "mp3_44100_128"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3".to_vec()))
            .mount(&mock_server)
            .await;

        let client = ElevenLabsClient::new(reqwest::Client::new(), &create_test_config(&mock_server.uri()));
        let url = client.text_to_speech("Good morning").await.unwrap();

        assert_eq!(url, "data:audio/mp3;base64,SUQz");
    }

    #[tokio::test]
    async fn test_quota_error_is_reported() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("quota_exceeded"))
            .mount(&mock_server)
            .await;

        let client = ElevenLabsClient::new(reqwest::Client::new(), &create_test_config(&mock_server.uri()));
        let err = client.text_to_speech("Good morning").await.unwrap_err();

        assert!(err.is_quota_exceeded());
    }

    #[tokio::test]
    async fn test_missing_key() {
        let mut config = create_test_config("http://127.0.0.1:9");
        config.elevenlabs_api_key = None;
        let client = ElevenLabsClient::new(reqwest::Client::new(), &config);

        let err = client.text_to_speech("Hello").await.unwrap_err();
        assert!(matches!(err, UpstreamError::MissingApiKey { provider: "ElevenLabs" }));
        assert!(!client.has_api_key());
    }
}
