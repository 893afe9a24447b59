//! HTTP endpoints for translation, language detection and speech.
//!
//! Every failure is returned as `{ "error": "..." }` with 400 for bad input,
//! 429 for upstream quota/rate limits and 500 for configuration or upstream
//! errors.

use crate::adapter::{Localizer, TranslationView};
use crate::detection::LanguageDetectionService;
use crate::error::UpstreamError;
use crate::i18n::{Language, LanguageRegistry};
use crate::metrics::MetricsReport;
use crate::service::TranslationService;
use crate::speech::{AudioUpload, AudioValidationError, ElevenLabsClient, MAX_AUDIO_BYTES};
use crate::translator::OpenAiClient;
use axum::{
    extract::{multipart::Multipart, rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Upstream translations resolved at once by a waiting UI-text request
const UI_TEXT_CONCURRENCY: usize = 4;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub openai: OpenAiClient,
    pub speech: ElevenLabsClient,
    pub detection: Arc<LanguageDetectionService>,
    pub localizer: Localizer,
    /// Most texts accepted by one `/api/ui-text` request
    pub max_batch_size: usize,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Configuration(_) | ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classify an upstream failure for the endpoint doing `action`.
    fn from_upstream(action: &str, err: UpstreamError) -> Self {
        error!("{} error: {}", action, err);

        if err.is_quota_exceeded() {
            return ApiError::RateLimited(
                "API quota exceeded or rate limited. Please try again later.".to_string(),
            );
        }

        match err {
            UpstreamError::MissingApiKey { provider } => {
                ApiError::Configuration(format!("{} API key not configured", provider))
            }
            UpstreamError::InvalidInput(message) => ApiError::BadRequest(message),
            other => ApiError::Upstream(format!("{} failed: {}", action, other)),
        }
    }
}

impl From<AudioValidationError> for ApiError {
    fn from(err: AudioValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

// ==================== Request / Response Bodies ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub source_text: Option<String>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    pub translated_text: String,
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectLanguageResponse {
    pub detected_language: String,
    pub text: String,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextToSpeechResponse {
    pub audio_url: String,
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct UiTextRequest {
    pub texts: Vec<String>,
    pub language: String,
    /// Block until every translation has resolved
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Serialize)]
pub struct UiTextResponse {
    pub language: Language,
    pub items: Vec<TranslationView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageInfo {
    pub code: &'static str,
    pub label: &'static str,
    pub emoji: &'static str,
    pub is_default: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub translation: MetricsReport,
    pub cached_records: usize,
}

/// Create the router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/languages", get(list_languages))
        .route("/api/ui-text", post(ui_text))
        .route("/api/translate", post(translate))
        .route("/api/detect-language", post(detect_language))
        .route(
            "/api/transcribe",
            // Leave headroom above the audio limit for multipart framing
            post(transcribe).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES + 1024 * 1024)),
        )
        .route("/api/text-to-speech", post(text_to_speech))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let service = state.localizer.service();
    Json(HealthResponse {
        status: "ok",
        translation: service.metrics(),
        cached_records: service.store().len(),
    })
}

async fn list_languages(State(state): State<AppState>) -> Json<Vec<LanguageInfo>> {
    let default_language = state.localizer.service().default_language();
    let languages = LanguageRegistry::get()
        .list_enabled()
        .into_iter()
        .map(|lang| LanguageInfo {
            code: lang.code,
            label: lang.label,
            emoji: lang.emoji,
            is_default: lang.code == default_language.code(),
        })
        .collect();
    Json(languages)
}

/// Cached UI-string translation, the HTTP face of `Localizer`
async fn ui_text(
    State(state): State<AppState>,
    body: Result<Json<UiTextRequest>, JsonRejection>,
) -> Result<Json<UiTextResponse>, ApiError> {
    let Json(request) = body?;
    let language = Language::from_code(&request.language)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if request.texts.len() > state.max_batch_size {
        return Err(ApiError::BadRequest(format!(
            "Too many texts: at most {} per request",
            state.max_batch_size
        )));
    }

    if request.wait {
        resolve_all(state.localizer.service(), &request.texts, language).await;
    }

    let items = request
        .texts
        .iter()
        .map(|text| state.localizer.view_in(text, language))
        .collect();

    Ok(Json(UiTextResponse { language, items }))
}

/// Translate `texts`, keeping at most `UI_TEXT_CONCURRENCY` calls in flight.
async fn resolve_all(service: &TranslationService, texts: &[String], language: Language) {
    let pending: Vec<_> = texts
        .iter()
        .map(|text| service.translate(text, language))
        .collect();
    stream::iter(pending)
        .buffer_unordered(UI_TEXT_CONCURRENCY)
        .collect::<Vec<_>>()
        .await;
}

async fn translate(
    State(state): State<AppState>,
    body: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<TranslateResponse>, ApiError> {
    if !state.openai.has_api_key() {
        return Err(ApiError::Configuration(
            "OpenAI API key not configured".to_string(),
        ));
    }

    let Json(request) = body?;
    let (Some(source_text), Some(source_language), Some(target_language)) = (
        required(request.source_text),
        required(request.source_language),
        required(request.target_language),
    ) else {
        return Err(ApiError::BadRequest(
            "Missing required parameters: sourceText, sourceLanguage, targetLanguage".to_string(),
        ));
    };

    if source_text.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Source text cannot be empty".to_string(),
        ));
    }

    let registry = LanguageRegistry::get();
    let translated_text = state
        .openai
        .translate_text(
            &source_text,
            registry.openai_name_for(&source_language),
            registry.openai_name_for(&target_language),
        )
        .await
        .map_err(|e| ApiError::from_upstream("Translation", e))?;

    Ok(Json(TranslateResponse {
        translated_text,
        success: true,
    }))
}

async fn detect_language(
    State(state): State<AppState>,
    body: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<DetectLanguageResponse>, ApiError> {
    if !state.openai.has_api_key() {
        return Err(ApiError::Configuration(
            "OpenAI API key not configured".to_string(),
        ));
    }

    let Json(request) = body?;
    let text = required(request.text)
        .ok_or_else(|| ApiError::BadRequest("Missing required parameter: text".to_string()))?;
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest("Text cannot be empty".to_string()));
    }

    let result = state.detection.detect(&text).await;

    Ok(Json(DetectLanguageResponse {
        detected_language: result.detected_language,
        text: result.text,
        success: true,
    }))
}

async fn transcribe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TranscribeResponse>, ApiError> {
    if !state.speech.has_api_key() {
        return Err(ApiError::Configuration(
            "ElevenLabs API key not configured".to_string(),
        ));
    }

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid form data: {}", e)))?
    {
        if field.name() != Some("audio") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or("recording.webm").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid audio upload: {}", e)))?;

        upload = Some(AudioUpload {
            bytes: bytes.to_vec(),
            content_type,
            file_name,
        });
        break;
    }

    let upload =
        upload.ok_or_else(|| ApiError::BadRequest("No audio file provided".to_string()))?;
    upload.validate()?;

    let text = state
        .speech
        .transcribe(upload)
        .await
        .map_err(|e| ApiError::from_upstream("Transcription", e))?;

    Ok(Json(TranscribeResponse {
        text,
        success: true,
    }))
}

async fn text_to_speech(
    State(state): State<AppState>,
    body: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<TextToSpeechResponse>, ApiError> {
    if !state.speech.has_api_key() {
        return Err(ApiError::Configuration(
            "ElevenLabs API key not configured".to_string(),
        ));
    }

    let Json(request) = body?;
    let text = required(request.text)
        .ok_or_else(|| ApiError::BadRequest("Missing required parameter: text".to_string()))?;
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest("Text cannot be empty".to_string()));
    }

    let audio_url = state
        .speech
        .text_to_speech(&text)
        .await
        .map_err(|e| ApiError::from_upstream("Text-to-speech", e))?;

    Ok(Json(TextToSpeechResponse {
        audio_url,
        success: true,
    }))
}
