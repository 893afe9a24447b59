//! Translation request coalescing on top of `TranslationStore`.
//!
//! `request_translation` is the only writer of translation results. It skips
//! work that is already done (cache hit, default language, blank text), marks
//! the text in flight, calls the translator under the retry policy and writes
//! the outcome back. Failures never reach the caller: after the last attempt
//! the original text is cached as the translation.
//!
//! The cache-hit check and the in-flight marking are not atomic with respect
//! to the awaited call, so two overlapping requests for the same pair can
//! both reach the translator. Sequential requests are always deduplicated.

use crate::error::UpstreamError;
use crate::i18n::Language;
use crate::identity::TextId;
use crate::metrics::{MetricsReport, TranslationMetrics};
use crate::retry::{with_retry_if, RetryConfig};
use crate::store::{TranslationRecord, TranslationStore};
use crate::translator::Translator;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

pub struct TranslationService {
    store: Arc<TranslationStore>,
    translator: Arc<dyn Translator>,
    retry: RetryConfig,
    default_language: Language,
    metrics: TranslationMetrics,
    verbose: bool,
}

impl TranslationService {
    pub fn new(store: Arc<TranslationStore>, translator: Arc<dyn Translator>) -> Self {
        Self {
            store,
            translator,
            retry: RetryConfig::translation(),
            default_language: Language::canonical(),
            metrics: TranslationMetrics::new(),
            verbose: true,
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_default_language(mut self, language: Language) -> Self {
        self.default_language = language;
        self
    }

    /// Toggle info-level logging of cache hits and completed translations.
    pub fn with_logging(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn store(&self) -> &Arc<TranslationStore> {
        &self.store
    }

    pub fn default_language(&self) -> Language {
        self.default_language
    }

    pub fn register_text(&self, original_text: &str) -> TextId {
        self.store.register(original_text)
    }

    pub fn get_translation(&self, id: &TextId, language: Option<Language>) -> Option<TranslationRecord> {
        self.store.get(id, language.map(|lang| lang.code()))
    }

    pub fn all_translations(&self) -> Vec<TranslationRecord> {
        self.store.all()
    }

    pub fn metrics(&self) -> MetricsReport {
        self.metrics.report()
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    /// Make sure a translation of `id` into `target` is cached.
    pub async fn request_translation(&self, id: &TextId, target: Language) {
        let Some(item) = self.store.get(id, None) else {
            debug!("No registered text for {}, skipping translation", id);
            return;
        };

        if target == self.default_language {
            return;
        }

        let key = id.composite(target.code());
        if let Some(existing) = self.store.get_exact(&key) {
            if existing.has_translation() {
                self.metrics.record_cache_hit();
                self.log(format_args!(
                    "Cache hit for \"{}\" -> \"{}\" ({})",
                    item.original_text,
                    existing.translated_text.as_deref().unwrap_or_default(),
                    target
                ));
                return;
            }
        }

        if item.original_text.trim().is_empty() {
            trace!("Skipping empty text for translation");
            return;
        }

        self.metrics.record_cache_miss();
        self.store.set_in_flight(id, true);
        self.log(format_args!(
            "Translating \"{}\" to {}",
            item.original_text, target
        ));

        let translated = match self.translate_with_retry(&item.original_text, target).await {
            Ok(translated) => translated,
            Err(e) => {
                self.metrics.record_fallback();
                warn!(
                    "Translation failed for \"{}\" ({}), keeping original text: {}",
                    item.original_text, target, e
                );
                item.original_text.clone()
            }
        };

        self.store.set(
            &key,
            TranslationRecord {
                id: key.to_string(),
                original_text: item.original_text.clone(),
                translated_text: Some(translated.clone()),
                in_flight: false,
                language: Some(target.code().to_string()),
            },
        );

        // Keep the base record current for single-language readers
        self.store.set(
            id,
            TranslationRecord {
                translated_text: Some(translated.clone()),
                in_flight: false,
                ..item.clone()
            },
        );

        self.log(format_args!(
            "Translation complete: \"{}\" -> \"{}\"",
            item.original_text, translated
        ));
    }

    /// Register `text` and translate it into `target` in one step.
    pub async fn translate(&self, text: &str, target: Language) -> String {
        let id = self.register_text(text);
        if target == self.default_language {
            return text.to_string();
        }

        self.request_translation(&id, target).await;
        self.store
            .get(&id, Some(target.code()))
            .and_then(|record| record.translated_text)
            .filter(|translated| !translated.is_empty())
            .unwrap_or_else(|| text.to_string())
    }

    async fn translate_with_retry(&self, text: &str, target: Language) -> Result<String, UpstreamError> {
        let operation_name = format!("Translation to {}", target.openai_name());
        with_retry_if(
            &self.retry,
            &operation_name,
            || async {
                self.metrics.record_api_call();
                let result = self.translator.translate(text, target).await;
                if result.is_err() {
                    self.metrics.record_api_failure();
                }
                result
            },
            UpstreamError::is_retryable,
        )
        .await
    }

    fn log(&self, message: fmt::Arguments<'_>) {
        if self.verbose {
            info!("{}", message);
        } else {
            trace!("{}", message);
        }
    }
}

impl fmt::Debug for TranslationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationService")
            .field("store", &self.store)
            .field("retry", &self.retry)
            .field("default_language", &self.default_language)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio::time::Instant;

    /// Translator that answers from a fixed table and counts calls.
    struct CountingTranslator {
        answer: &'static str,
        calls: AtomicUsize,
    }

    impl CountingTranslator {
        fn new(answer: &'static str) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Translator for CountingTranslator {
        async fn translate(&self, _text: &str, _target: Language) -> Result<String, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.to_string())
        }
    }

    /// Translator that always fails with the given status, recording when.
    struct FailingTranslator {
        status: StatusCode,
        started: Instant,
        attempts_at: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Translator for FailingTranslator {
        async fn translate(&self, _text: &str, _target: Language) -> Result<String, UpstreamError> {
            self.attempts_at.lock().unwrap().push(self.started.elapsed());
            Err(UpstreamError::Api {
                provider: "OpenAI",
                status: self.status,
                body: "upstream failure".to_string(),
            })
        }
    }

    /// Translator that blocks until released.
    struct GatedTranslator {
        gate: Notify,
    }

    #[async_trait]
    impl Translator for GatedTranslator {
        async fn translate(&self, _text: &str, _target: Language) -> Result<String, UpstreamError> {
            self.gate.notified().await;
            Ok("欢迎".to_string())
        }
    }

    fn service_with(translator: Arc<dyn Translator>) -> TranslationService {
        TranslationService::new(Arc::new(TranslationStore::new()), translator)
    }

    #[tokio::test]
    async fn test_translation_is_cached_under_composite_key() {
        let translator = CountingTranslator::new("欢迎");
        let service = service_with(translator.clone());

        let id = service.register_text("Welcome");
        service.request_translation(&id, Language::CHINESE).await;

        let record = service
            .get_translation(&id, Some(Language::CHINESE))
            .unwrap();
        assert_eq!(record.id, id.composite("zh").as_str());
        assert_eq!(record.translated_text.as_deref(), Some("欢迎"));
        assert_eq!(record.language.as_deref(), Some("zh"));
        assert!(!record.in_flight);

        // Base record mirrors the latest translation
        let base = service.get_translation(&id, None).unwrap();
        assert_eq!(base.translated_text.as_deref(), Some("欢迎"));
        assert!(!base.in_flight);
    }

    #[tokio::test]
    async fn test_second_request_is_deduplicated() {
        let translator = CountingTranslator::new("欢迎");
        let service = service_with(translator.clone());

        let id = service.register_text("Welcome");
        service.request_translation(&id, Language::CHINESE).await;
        service.request_translation(&id, Language::CHINESE).await;

        assert_eq!(translator.calls(), 1);
        let metrics = service.metrics();
        assert_eq!(metrics.cache_hits, 1);
        assert_eq!(metrics.cache_misses, 1);
    }

    #[tokio::test]
    async fn test_each_language_is_translated_once() {
        let translator = CountingTranslator::new("translated");
        let service = service_with(translator.clone());

        let id = service.register_text("Welcome");
        service.request_translation(&id, Language::CHINESE).await;
        service.request_translation(&id, Language::TAMIL).await;
        service.request_translation(&id, Language::CHINESE).await;

        assert_eq!(translator.calls(), 2);
    }

    #[tokio::test]
    async fn test_default_language_never_calls_out() {
        let translator = CountingTranslator::new("unused");
        let service = service_with(translator.clone());

        let id = service.register_text("Welcome");
        service.request_translation(&id, Language::ENGLISH).await;

        assert_eq!(translator.calls(), 0);
        assert!(service.store().get_exact(id.composite("en")).is_none());
        assert_eq!(service.translate("Welcome", Language::ENGLISH).await, "Welcome");
    }

    #[tokio::test]
    async fn test_unregistered_id_is_noop() {
        let translator = CountingTranslator::new("unused");
        let service = service_with(translator.clone());

        service
            .request_translation(&crate::identity::identify("ghost"), Language::CHINESE)
            .await;

        assert_eq!(translator.calls(), 0);
        assert!(service.all_translations().is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_text_is_skipped() {
        let translator = CountingTranslator::new("unused");
        let service = service_with(translator.clone());

        let in_flight_seen = Arc::new(AtomicUsize::new(0));
        let seen = in_flight_seen.clone();
        let store = Arc::downgrade(service.store());
        service.store().subscribe(move |_| {
            if let Some(store) = store.upgrade() {
                if store.all().iter().any(|record| record.in_flight) {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        for text in ["", "   ", "\n\t"] {
            let id = service.register_text(text);
            service.request_translation(&id, Language::TAMIL).await;
            assert!(service.store().get_exact(id.composite("ta")).is_none());
        }

        assert_eq!(translator.calls(), 0);
        assert_eq!(in_flight_seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fall_back_to_original() {
        let translator = Arc::new(FailingTranslator {
            status: StatusCode::SERVICE_UNAVAILABLE,
            started: Instant::now(),
            attempts_at: Mutex::new(Vec::new()),
        });
        let service = service_with(translator.clone());

        let id = service.register_text("Take your medicine");
        service.request_translation(&id, Language::MALAY).await;

        let attempts = translator.attempts_at.lock().unwrap().clone();
        assert_eq!(attempts.len(), 3);
        // 2s after the first failure, 4s after the second
        assert_eq!(attempts[1] - attempts[0], Duration::from_secs(2));
        assert_eq!(attempts[2] - attempts[1], Duration::from_secs(4));

        let record = service.get_translation(&id, Some(Language::MALAY)).unwrap();
        assert_eq!(record.translated_text.as_deref(), Some("Take your medicine"));
        assert!(!record.in_flight);
        assert!(!service.get_translation(&id, None).unwrap().in_flight);

        let metrics = service.metrics();
        assert_eq!(metrics.api_calls, 3);
        assert_eq!(metrics.api_failures, 3);
        assert_eq!(metrics.fallbacks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let translator = Arc::new(FailingTranslator {
            status: StatusCode::BAD_REQUEST,
            started: Instant::now(),
            attempts_at: Mutex::new(Vec::new()),
        });
        let service = service_with(translator.clone());

        let id = service.register_text("Add task");
        service.request_translation(&id, Language::TAMIL).await;

        assert_eq!(translator.attempts_at.lock().unwrap().len(), 1);
        let record = service.get_translation(&id, Some(Language::TAMIL)).unwrap();
        assert_eq!(record.translated_text.as_deref(), Some("Add task"));
    }

    #[tokio::test]
    async fn test_in_flight_until_resolved() {
        let translator = Arc::new(GatedTranslator { gate: Notify::new() });
        let service = Arc::new(service_with(translator.clone()));

        let id = service.register_text("Welcome");
        let task = {
            let service = service.clone();
            let id = id.clone();
            tokio::spawn(async move { service.request_translation(&id, Language::CHINESE).await })
        };

        // Wait for the in-flight mark
        let mut changes = service.store().changes();
        while !service.get_translation(&id, None).unwrap().in_flight {
            changes.changed().await.unwrap();
        }

        let pending = service.get_translation(&id, Some(Language::CHINESE)).unwrap();
        assert_eq!(pending.translated_text.as_deref(), Some("Welcome"));
        assert!(pending.in_flight);

        translator.gate.notify_one();
        task.await.unwrap();

        let done = service.get_translation(&id, Some(Language::CHINESE)).unwrap();
        assert_eq!(done.translated_text.as_deref(), Some("欢迎"));
        assert!(!done.in_flight);
    }

    #[tokio::test]
    async fn test_translate_convenience() {
        let translator = CountingTranslator::new("Selamat datang");
        let service = service_with(translator.clone());

        assert_eq!(service.translate("Welcome", Language::MALAY).await, "Selamat datang");
        assert_eq!(service.translate("Welcome", Language::MALAY).await, "Selamat datang");
        assert_eq!(translator.calls(), 1);
    }

    #[tokio::test]
    async fn test_clear_forgets_translations() {
        let translator = CountingTranslator::new("欢迎");
        let service = service_with(translator.clone());

        service.translate("Welcome", Language::CHINESE).await;
        service.clear();
        assert!(service.all_translations().is_empty());

        service.translate("Welcome", Language::CHINESE).await;
        assert_eq!(translator.calls(), 2);
    }

    #[tokio::test]
    async fn test_custom_default_language() {
        let translator = CountingTranslator::new("unused");
        let service = service_with(translator.clone()).with_default_language(Language::TAMIL);

        let id = service.register_text("வணக்கம்");
        service.request_translation(&id, Language::TAMIL).await;

        assert_eq!(translator.calls(), 0);
    }
}
