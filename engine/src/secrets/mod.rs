//! Secret handling
//!
//! API keys are looked up in the environment first and the OS keychain
//! second, then cached for the life of the process. Anything that leaves the
//! process as text (error payloads, stream events, logs) goes through
//! [`scrub_secrets`].

pub mod store;

pub use store::SecretStore;

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Regex patterns for detecting common secret formats, compiled once.
static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn secret_patterns() -> &'static [Regex] {
    SECRET_PATTERNS.get_or_init(|| {
        [
            // OpenAI style keys, including sk-proj- and sk-test- variants
            r"sk-[a-zA-Z0-9\-_]{20,}",
            // Google API keys
            r"AIza[0-9A-Za-z\-_]{35}",
            // Bearer tokens
            r"Bearer\s+[^\s]{20,}",
            // Keys leaked through query strings (?key=...)
            r"([?&]key=)[^&\s)]+",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

/// Replace every detected secret in `text` with `[REDACTED]`.
///
/// # Examples
/// ```
/// use devteam_engine::secrets::scrub_secrets;
///
/// let scrubbed = scrub_secrets("My API key is sk-1234567890abcdefghij");
/// assert_eq!(scrubbed, "My API key is [REDACTED]");
/// ```
pub fn scrub_secrets(text: &str) -> String {
    let mut result = text.to_string();

    for pattern in secret_patterns() {
        result = if pattern.captures_len() > 1 {
            pattern.replace_all(&result, "${1}[REDACTED]").into_owned()
        } else {
            pattern.replace_all(&result, "[REDACTED]").into_owned()
        };
    }

    result
}

/// A wrapper for sensitive string data that prevents accidental logging.
///
/// `Debug` and `Display` always print `[REDACTED]`; use `unsecure()` to reach
/// the value when building a request.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Access the raw underlying string
    pub fn unsecure(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}
