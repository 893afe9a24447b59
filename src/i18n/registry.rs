//! Language registry: Single source of truth for all supported languages.
//!
//! The registry is immutable after initialization, so a `OnceLock` singleton
//! is enough; mutable translation state lives in `TranslationStore` instead.

use std::sync::OnceLock;

/// Configuration for a supported language.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// ISO 639-1 language code (e.g., "en", "zh")
    pub code: &'static str,

    /// Label shown in the language switcher, in the language itself
    pub label: &'static str,

    /// Flag emoji shown next to the label
    pub emoji: &'static str,

    /// Name given to the completion model in translation prompts
    pub openai_name: &'static str,

    /// Whether this is the canonical/source language (only one should be true)
    pub is_canonical: bool,

    /// Whether this language is enabled for use
    pub enabled: bool,
}

/// Global language registry singleton.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

/// Global registry instance (initialized lazily)
static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the global language registry instance.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Get a language configuration by its code.
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// Get all enabled languages, in switcher order.
    pub fn list_enabled(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().filter(|lang| lang.enabled).collect()
    }

    /// Get the canonical language configuration.
    ///
    /// # Panics
    /// Panics if the registry does not define exactly one canonical language.
    pub fn canonical(&self) -> &LanguageConfig {
        let canonical_langs: Vec<_> = self
            .languages
            .iter()
            .filter(|lang| lang.is_canonical)
            .collect();

        match canonical_langs.len() {
            0 => panic!("No canonical language found in registry"),
            1 => canonical_langs[0],
            _ => panic!("Multiple canonical languages found in registry"),
        }
    }

    /// Check if a language code is supported and enabled.
    pub fn is_enabled(&self, code: &str) -> bool {
        self.get_by_code(code)
            .map(|lang| lang.enabled)
            .unwrap_or(false)
    }

    /// Prompt-friendly language name, falling back to the raw code for
    /// languages the registry does not know.
    pub fn openai_name_for<'a>(&self, code: &'a str) -> &'a str {
        match self.get_by_code(code) {
            Some(config) => config.openai_name,
            None => code,
        }
    }
}

fn default_languages() -> Vec<LanguageConfig> {
    vec![
        LanguageConfig {
            code: "en",
            label: "English",
            emoji: "🇬🇧",
            openai_name: "English",
            is_canonical: true,
            enabled: true,
        },
        LanguageConfig {
            code: "zh",
            label: "中文",
            emoji: "🇨🇳",
            openai_name: "Chinese (Simplified)",
            is_canonical: false,
            enabled: true,
        },
        LanguageConfig {
            code: "ta",
            label: "தமிழ்",
            emoji: "🇮🇳",
            openai_name: "Tamil",
            is_canonical: false,
            enabled: true,
        },
        LanguageConfig {
            code: "ms",
            label: "Bahasa Melayu",
            emoji: "🇲🇾",
            openai_name: "Malay (Bahasa Melayu)",
            is_canonical: false,
            enabled: true,
        },
        LanguageConfig {
            code: "tl",
            label: "Tagalog",
            emoji: "🇵🇭",
            openai_name: "Tagalog (Filipino)",
            is_canonical: false,
            enabled: true,
        },
        LanguageConfig {
            code: "id",
            label: "Bahasa Indonesia",
            emoji: "🇮🇩",
            openai_name: "Indonesian",
            is_canonical: false,
            enabled: true,
        },
        LanguageConfig {
            code: "my",
            label: "မြန်မာဘာသာ",
            emoji: "🇲🇲",
            openai_name: "Burmese (Myanmar)",
            is_canonical: false,
            enabled: true,
        },
    ]
}
