//! Read-side adapter for presentation code.
//!
//! `Localizer` pairs the translation service with the current language
//! selection. Reading a text through it registers the text and, for a
//! non-default language, queues its translation in the background, so
//! callers only ever ask "what should I show for this string right now".

use crate::i18n::Language;
use crate::service::TranslationService;
use crate::store::{StoreEvent, SubscriptionId};
use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};

/// What to render for one source string in the current language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationView {
    pub translated_text: String,
    pub is_translating: bool,
    pub original_text: String,
}

#[derive(Debug, Clone)]
pub struct Localizer {
    service: Arc<TranslationService>,
    language: Arc<watch::Sender<Language>>,
}

impl Localizer {
    /// Start in the service's default language.
    pub fn new(service: Arc<TranslationService>) -> Self {
        let (language, _) = watch::channel(service.default_language());
        Self {
            service,
            language: Arc::new(language),
        }
    }

    pub fn service(&self) -> &Arc<TranslationService> {
        &self.service
    }

    pub fn current_language(&self) -> Language {
        *self.language.borrow()
    }

    /// Switch the display language. Texts read afterwards are translated
    /// into the new language on demand.
    pub fn set_language(&self, language: Language) {
        self.language.send_if_modified(|current| {
            if *current == language {
                false
            } else {
                debug!("Switching display language {} -> {}", current, language);
                *current = language;
                true
            }
        });
    }

    /// Watch language switches.
    pub fn language_changes(&self) -> watch::Receiver<Language> {
        self.language.subscribe()
    }

    /// Re-render hook: called whenever cached translations change.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.service.store().subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.service.store().unsubscribe(id)
    }

    /// Current view of `text`, queueing its translation if needed.
    ///
    /// Outside a Tokio runtime nothing is queued and the cached state is
    /// returned as is.
    pub fn translate(&self, text: &str) -> TranslationView {
        self.view_in(text, self.current_language())
    }

    /// Same as [`Localizer::translate`] for an explicit language, leaving
    /// the current selection untouched.
    pub fn view_in(&self, text: &str, language: Language) -> TranslationView {
        let id = self.service.register_text(text);

        if language == self.service.default_language() {
            return TranslationView {
                translated_text: text.to_string(),
                is_translating: false,
                original_text: text.to_string(),
            };
        }

        // Snapshot before queueing so the first read never sees a partial state
        let record = self.service.get_translation(&id, Some(language));

        match Handle::try_current() {
            Ok(runtime) => {
                let service = Arc::clone(&self.service);
                let queued_id = id.clone();
                runtime.spawn(async move {
                    service.request_translation(&queued_id, language).await;
                });
            }
            Err(_) => warn!(
                "No Tokio runtime, not queueing translation of \"{}\" to {}",
                text, language
            ),
        }

        let translated_text = record
            .as_ref()
            .and_then(|record| record.translated_text.clone())
            .filter(|translated| !translated.is_empty())
            .unwrap_or_else(|| text.to_string());

        TranslationView {
            translated_text,
            is_translating: record.map(|record| record.in_flight).unwrap_or(false),
            original_text: text.to_string(),
        }
    }

    pub fn translate_many<S: AsRef<str>>(&self, texts: &[S]) -> Vec<TranslationView> {
        texts.iter().map(|text| self.translate(text.as_ref())).collect()
    }

    /// Just the string to display.
    ///
    /// A translation that mentions "error" is treated as a model failure
    /// and the original text is shown instead.
    pub fn t(&self, text: &str) -> String {
        let view = self.translate(text);
        if view.translated_text.to_lowercase().contains("error") {
            text.to_string()
        } else {
            view.translated_text
        }
    }
}
