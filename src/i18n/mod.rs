//! Supported UI languages.
//!
//! - `registry`: Single source of truth for all supported languages and their metadata
//! - `language`: Type-safe `Language` validated against the registry
//!
//! ```rust,ignore
//! use care_i18n::i18n::{Language, LanguageRegistry};
//!
//! let canonical = Language::canonical();
//! let tamil = Language::from_code("ta")?;
//! let languages = LanguageRegistry::get().list_enabled();
//! ```

mod language;
mod registry;

pub use language::Language;
pub use registry::{LanguageConfig, LanguageRegistry};
