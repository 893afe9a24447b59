//! Translation cache and AI language services for a caregiving coordination app.
//!
//! The core is a process-wide, content-keyed translation cache
//! ([`store::TranslationStore`]) with a coalescing request layer
//! ([`service::TranslationService`]) and a read-side adapter for UI code
//! ([`adapter::Localizer`]). The [`api`] module exposes it over HTTP next to
//! the translate, detect-language, transcribe and text-to-speech endpoints.

pub mod adapter;
pub mod api;
pub mod config;
pub mod detection;
pub mod error;
pub mod i18n;
pub mod identity;
pub mod metrics;
pub mod retry;
pub mod service;
pub mod speech;
pub mod store;
pub mod translator;
