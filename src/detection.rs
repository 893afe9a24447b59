//! Language detection with a time-bounded cache.

use crate::error::UpstreamError;
use crate::i18n::Language;
use crate::identity::detection_key;
use crate::retry::{with_retry_if, RetryConfig};
use crate::translator::LanguageDetector;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub detected_language: String,
    pub text: String,
}

#[derive(Debug, Clone)]
struct CachedDetection {
    result: DetectionResult,
    detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectionCacheStats {
    pub entries: usize,
}

pub struct LanguageDetectionService {
    detector: Arc<dyn LanguageDetector>,
    retry: RetryConfig,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedDetection>>,
}

impl LanguageDetectionService {
    pub fn new(detector: Arc<dyn LanguageDetector>) -> Self {
        Self {
            detector,
            retry: RetryConfig::translation(),
            ttl: Duration::hours(24),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Detect the language of `text`, defaulting to the canonical language
    /// for blank text or when the detector keeps failing.
    pub async fn detect(&self, text: &str) -> DetectionResult {
        if text.trim().is_empty() {
            return fallback(text);
        }

        let key = detection_key(text);
        if let Some(cached) = self.cached(&key) {
            debug!("Language detection cache hit for {}", key);
            return cached;
        }

        let result = match self.detect_with_retry(text).await {
            Ok(code) => DetectionResult {
                detected_language: code,
                text: text.to_string(),
            },
            Err(e) => {
                warn!("All language detection attempts failed: {}", e);
                fallback(text)
            }
        };

        let now = Utc::now();
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.retain(|_, entry| now - entry.detected_at < self.ttl);
        cache.insert(
            key,
            CachedDetection {
                result: result.clone(),
                detected_at: now,
            },
        );

        result
    }

    /// Detect several texts concurrently, preserving order.
    pub async fn detect_many<S: AsRef<str>>(&self, texts: &[S]) -> Vec<DetectionResult> {
        join_all(texts.iter().map(|text| self.detect(text.as_ref()))).await
    }

    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn cache_stats(&self) -> DetectionCacheStats {
        DetectionCacheStats {
            entries: self
                .cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
        }
    }

    /// Fresh cached result for `key`; an expired entry is dropped.
    fn cached(&self, key: &str) -> Option<DetectionResult> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = cache.get(key)?;
        if Utc::now() - entry.detected_at < self.ttl {
            return Some(entry.result.clone());
        }

        cache.remove(key);
        None
    }

    async fn detect_with_retry(&self, text: &str) -> Result<String, UpstreamError> {
        with_retry_if(
            &self.retry,
            "Language detection",
            || self.detector.detect_language(text),
            UpstreamError::is_retryable,
        )
        .await
    }
}

fn fallback(text: &str) -> DetectionResult {
    DetectionResult {
        detected_language: Language::canonical().code().to_string(),
        text: text.to_string(),
    }
}
