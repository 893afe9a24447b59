//! Stable, content-derived identifiers for translatable text.
//!
//! Identity is a cheap rolling hash over a bounded prefix of the text plus
//! its length. Distinct texts can collide; UI strings are low-stakes, so a
//! collision only means one label briefly shows another's translation.

use serde::Serialize;
use std::fmt;

/// Number of UTF-16 units hashed for translation ids.
pub const TEXT_ID_PREFIX_LEN: usize = 50;

/// Number of UTF-16 units hashed for language-detection cache keys.
pub const DETECTION_KEY_PREFIX_LEN: usize = 100;

/// Identity of a registered source text (e.g. `trans_1ekf2v_7`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TextId(String);

impl TextId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the cached translation of this text into `language_code`.
    pub fn composite(&self, language_code: &str) -> CompositeKey {
        CompositeKey(format!("{}_{}", self.0, language_code))
    }
}

impl AsRef<str> for TextId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text identity joined with a target language code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CompositeKey(String);

impl CompositeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CompositeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the identity of `text`.
pub fn identify(text: &str) -> TextId {
    TextId(tagged_key("trans", text, TEXT_ID_PREFIX_LEN))
}

/// Cache key used by language detection (`lang_<hash>_<len>`).
pub fn detection_key(text: &str) -> String {
    tagged_key("lang", text, DETECTION_KEY_PREFIX_LEN)
}

fn tagged_key(tag: &str, text: &str, prefix_len: usize) -> String {
    let hash = prefix_hash(text, prefix_len);
    let len = text.encode_utf16().count();
    format!("{}_{}_{}", tag, to_base36(hash.unsigned_abs() as u64), len)
}

/// 32-bit `h * 31 + unit` over the first `prefix_len` UTF-16 units.
fn prefix_hash(text: &str, prefix_len: usize) -> i32 {
    text.encode_utf16()
        .take(prefix_len)
        .fold(0i32, |hash, unit| {
            hash.wrapping_shl(5)
                .wrapping_sub(hash)
                .wrapping_add(i32::from(unit))
        })
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
