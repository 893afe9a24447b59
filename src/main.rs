use anyhow::{Context, Result};
use care_i18n::adapter::Localizer;
use care_i18n::api::{self, AppState};
use care_i18n::config::Config;
use care_i18n::detection::LanguageDetectionService;
use care_i18n::i18n::Language;
use care_i18n::service::TranslationService;
use care_i18n::speech::ElevenLabsClient;
use care_i18n::store::TranslationStore;
use care_i18n::translator::{MockTranslator, OpenAiClient, Translator};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when the variables come from the environment)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("care_i18n=info".parse()?),
        )
        .init();

    info!("Starting care-i18n service");

    // Load configuration from environment
    let config = Config::from_env()?;
    let default_language = Language::from_code(&config.default_language)
        .context("DEFAULT_LANGUAGE must be a supported language code")?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.translation_timeout_ms))
        .build()
        .context("Failed to build HTTP client")?;

    let openai = OpenAiClient::new(http.clone(), &config);
    if !openai.has_api_key() {
        warn!("OPENAI_API_KEY not set, translation endpoints will return 500");
    }

    let translator: Arc<dyn Translator> = if config.use_real_translation && openai.has_api_key() {
        Arc::new(openai.clone())
    } else {
        info!("Using mock translations for UI text");
        Arc::new(MockTranslator)
    };

    let store = Arc::new(TranslationStore::new());
    let service = TranslationService::new(store, translator)
        .with_default_language(default_language)
        .with_logging(config.translation_logging);
    let localizer = Localizer::new(Arc::new(service));

    let speech = ElevenLabsClient::new(http, &config);
    if !speech.has_api_key() {
        warn!("ELEVENLABS_API_KEY not set, speech endpoints will return 500");
    }

    let state = AppState {
        detection: Arc::new(LanguageDetectionService::new(Arc::new(openai.clone()))),
        openai,
        speech,
        localizer,
        max_batch_size: config.max_batch_size,
    };

    let app = api::create_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("✓ Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
