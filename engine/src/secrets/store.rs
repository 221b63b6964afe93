use super::SecretString;
use keyring::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

/// Keychain service name secrets are stored under
pub const KEYRING_SERVICE: &str = "devteam";

/// Environment variables checked for each secret key, in order
fn env_vars_for(key: &str) -> &'static [&'static str] {
    match key {
        "gemini_api_key" => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        "openai_api_key" => &["OPENAI_API_KEY"],
        _ => &[],
    }
}

/// Looks up API keys from the environment, then the OS keychain.
///
/// Lookups are never interactive: the server may run without a terminal.
/// Results, including misses, are cached so the keychain is hit at most once
/// per key.
pub struct SecretStore {
    service_name: String,
    cache: RwLock<HashMap<String, Option<SecretString>>>,
}

impl SecretStore {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the secret for `key`, or `None` when no source has it.
    pub fn get(&self, key: &str) -> Option<SecretString> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.get(key) {
                return cached.clone();
            }
        }

        let found = self.lookup_env(key).or_else(|| self.lookup_keychain(key));

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.insert(key.to_string(), found.clone());
        found
    }

    /// Seed a value directly, bypassing the environment and keychain.
    pub fn insert(&self, key: &str, value: impl Into<String>) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.insert(key.to_string(), Some(SecretString::new(value)));
    }

    fn lookup_env(&self, key: &str) -> Option<SecretString> {
        env_vars_for(key).iter().find_map(|var| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| {
                    tracing::debug!("Secret '{}' loaded from ${}", key, var);
                    SecretString::new(v.trim())
                })
        })
    }

    fn lookup_keychain(&self, key: &str) -> Option<SecretString> {
        let entry = match Entry::new(&self.service_name, key) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Keychain unavailable for '{}': {}", key, e);
                return None;
            }
        };

        match entry.get_password() {
            Ok(secret) => {
                tracing::debug!("Retrieved secret '{}' from keychain", key);
                Some(SecretString::new(secret))
            }
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                tracing::warn!("Failed to read secret '{}' from keychain: {}", key, e);
                None
            }
        }
    }
}

impl Default for SecretStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inserted_value_wins() {
        let store = SecretStore::new("devteam-test");
        store.insert("openai_api_key", "sk-test");
        assert_eq!(
            store.get("openai_api_key").map(|s| s.unsecure().to_string()),
            Some("sk-test".to_string())
        );
    }

    #[test]
    fn test_unknown_key_has_no_env_source() {
        assert!(env_vars_for("telegram_token").is_empty());
        assert_eq!(
            env_vars_for("gemini_api_key"),
            &["GEMINI_API_KEY", "GOOGLE_API_KEY"]
        );
    }
}
