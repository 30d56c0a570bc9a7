use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::ConfigError;

pub const API_KEY: &str = "OPENAI_API_KEY";
pub const MODEL: &str = "OPENAI_MODEL";
pub const MAX_TOKENS: &str = "MAX_TOKENS";
pub const TEMPERATURE: &str = "TEMPERATURE";
pub const BASE_URL: &str = "OPENAI_BASE_URL";
pub const REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const KNOWN_KEYS: [&str; 6] = [
    API_KEY,
    MODEL,
    MAX_TOKENS,
    TEMPERATURE,
    BASE_URL,
    REQUEST_TIMEOUT_SECS,
];

/// A flat set of `KEY=VALUE` settings from one configuration source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `.env`-style text. Comments, blank lines and lines without `=`
    /// are skipped; later duplicates win.
    pub fn parse_env_content(content: &str) -> Self {
        let mut settings = Self::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            settings.set(key, strip_quotes(value.trim()));
        }
        settings
    }

    pub fn from_env() -> Self {
        let mut settings = Self::new();
        for key in KNOWN_KEYS {
            if let Ok(value) = std::env::var(key) {
                settings.set(key, value);
            }
        }
        settings
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Returns the value unless it is missing or blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Checks every entry with [`check_setting`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.values
            .iter()
            .try_for_each(|(key, value)| check_setting(key, value))
    }

    /// All entries with secret-looking values masked, for display.
    pub fn masked(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| {
                let shown = if is_secret_key(k) {
                    mask_secret(v)
                } else {
                    v.clone()
                };
                (k.clone(), shown)
            })
            .collect()
    }
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

pub fn is_secret_key(key: &str) -> bool {
    let upper = key.to_uppercase();
    upper.contains("KEY") || upper.contains("SECRET") || upper.contains("API")
}

pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 4 {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("***{}", tail)
    } else {
        "***".to_string()
    }
}

/// The configuration a completion request is issued with.
///
/// Only [`ConfigSources::resolve`] builds one, so holding an `EffectiveConfig`
/// means an API key was found.
#[derive(Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    #[serde(skip)]
    api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl EffectiveConfig {
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn masked_api_key(&self) -> String {
        mask_secret(&self.api_key)
    }
}

impl std::fmt::Debug for EffectiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectiveConfig")
            .field("api_key", &self.masked_api_key())
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Every place a setting can come from, highest precedence first:
/// direct key, session settings, `.env` block, process environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub direct_api_key: Option<String>,
    pub session: Settings,
    pub env_block: Settings,
    pub process_env: Settings,
}

impl ConfigSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_direct_key(mut self, key: impl Into<String>) -> Self {
        self.direct_api_key = Some(key.into());
        self
    }

    pub fn with_env_block(mut self, content: &str) -> Self {
        self.env_block = Settings::parse_env_content(content);
        self
    }

    pub fn with_process_env(mut self) -> Self {
        self.process_env = Settings::from_env();
        self
    }

    fn layered(&self, key: &str) -> Option<&str> {
        [&self.session, &self.env_block, &self.process_env]
            .into_iter()
            .find_map(|layer| layer.get(key))
    }

    pub fn resolve_api_key(&self) -> Option<&str> {
        self.direct_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| self.layered(API_KEY))
    }

    pub fn resolve(&self) -> Result<EffectiveConfig, ConfigError> {
        let api_key = self
            .resolve_api_key()
            .ok_or(ConfigError::MissingApiKey)?
            .to_string();

        let model = self.layered(MODEL).unwrap_or(DEFAULT_MODEL).to_string();

        let max_tokens = match self.layered(MAX_TOKENS) {
            Some(raw) => parse_max_tokens(raw)?,
            None => DEFAULT_MAX_TOKENS,
        };

        let temperature = match self.layered(TEMPERATURE) {
            Some(raw) => parse_temperature(raw)?,
            None => DEFAULT_TEMPERATURE,
        };

        let base_url = match self.layered(BASE_URL) {
            Some(raw) => parse_base_url(raw)?,
            None => DEFAULT_BASE_URL.to_string(),
        };

        let timeout = match self.layered(REQUEST_TIMEOUT_SECS) {
            Some(raw) => Some(parse_timeout(raw)?),
            None => None,
        };

        Ok(EffectiveConfig {
            api_key,
            model,
            max_tokens,
            temperature,
            base_url,
            timeout,
        })
    }
}

/// Checks one setting the way [`ConfigSources::resolve`] would. Keys that
/// do not affect requests are accepted as-is.
pub fn check_setting(key: &str, raw: &str) -> Result<(), ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(());
    }
    match key {
        MAX_TOKENS => parse_max_tokens(raw).map(drop),
        TEMPERATURE => parse_temperature(raw).map(drop),
        BASE_URL => parse_base_url(raw).map(drop),
        REQUEST_TIMEOUT_SECS => parse_timeout(raw).map(drop),
        _ => Ok(()),
    }
}

fn invalid(key: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason,
    }
}

pub(crate) fn parse_max_tokens(raw: &str) -> Result<u32, ConfigError> {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(
            MAX_TOKENS,
            format!("expected a positive integer, got {:?}", raw),
        )),
    }
}

pub(crate) fn parse_temperature(raw: &str) -> Result<f64, ConfigError> {
    match raw.parse::<f64>() {
        Ok(t) if (0.0..=2.0).contains(&t) => Ok(t),
        _ => Err(invalid(
            TEMPERATURE,
            format!("expected a number between 0.0 and 2.0, got {:?}", raw),
        )),
    }
}

/// Accepts absolute `http` or `https` URLs; the trailing slash is dropped.
pub(crate) fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim_end_matches('/');
    let url = reqwest::Url::parse(trimmed)
        .map_err(|e| invalid(BASE_URL, format!("{:?} is not a URL: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(trimmed.to_string()),
        _ => Err(invalid(
            BASE_URL,
            format!("expected an http(s) URL with a host, got {:?}", raw),
        )),
    }
}

pub(crate) fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(_) => Err(invalid(
            REQUEST_TIMEOUT_SECS,
            format!("expected whole seconds, got {:?}", raw),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_content() {
        let content = r#"
# OpenAI Configuration
OPENAI_API_KEY="sk-test-1234"
OPENAI_MODEL = gpt-4o
MAX_TOKENS=500
not a setting
TEMPERATURE='0.2'
URL=https://example.com/?a=b
"#;
        let settings = Settings::parse_env_content(content);

        assert_eq!(settings.get(API_KEY), Some("sk-test-1234"));
        assert_eq!(settings.get(MODEL), Some("gpt-4o"));
        assert_eq!(settings.get(MAX_TOKENS), Some("500"));
        assert_eq!(settings.get(TEMPERATURE), Some("0.2"));
        assert_eq!(settings.get("URL"), Some("https://example.com/?a=b"));
        assert_eq!(settings.len(), 5);
    }

    #[test]
    fn test_parse_env_later_duplicate_wins() {
        let settings = Settings::parse_env_content("A=1\nA=2\n");
        assert_eq!(settings.get("A"), Some("2"));
    }

    #[test]
    fn test_blank_values_count_as_absent() {
        let settings = Settings::new().with(API_KEY, "   ");
        assert_eq!(settings.get(API_KEY), None);
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk-abcdef1234"), "***1234");
        assert_eq!(mask_secret("abcd"), "***");
        assert_eq!(mask_secret(""), "***");
    }

    #[test]
    fn test_masked_settings_hide_only_secrets() {
        let settings = Settings::new()
            .with(API_KEY, "sk-abcdef1234")
            .with(MODEL, "gpt-4o");
        let masked = settings.masked();
        assert_eq!(masked[API_KEY], "***1234");
        assert_eq!(masked[MODEL], "gpt-4o");
    }

    #[test]
    fn test_resolve_defaults() {
        let config = ConfigSources::new()
            .with_direct_key("sk-direct")
            .resolve()
            .unwrap();

        assert_eq!(config.api_key(), "sk-direct");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_env_block_key_used_without_direct_key() {
        let config = ConfigSources::new()
            .with_env_block("OPENAI_API_KEY=sk-from-block\n")
            .resolve()
            .unwrap();
        assert_eq!(config.api_key(), "sk-from-block");
    }

    #[test]
    fn test_precedence_order() {
        let sources = ConfigSources {
            direct_api_key: Some("sk-direct".to_string()),
            session: Settings::new()
                .with(API_KEY, "sk-session")
                .with(MODEL, "session-model"),
            env_block: Settings::new()
                .with(API_KEY, "sk-block")
                .with(MODEL, "block-model")
                .with(MAX_TOKENS, "200"),
            process_env: Settings::new()
                .with(API_KEY, "sk-env")
                .with(MAX_TOKENS, "300")
                .with(TEMPERATURE, "1.5"),
        };

        let config = sources.resolve().unwrap();
        assert_eq!(config.api_key(), "sk-direct");
        assert_eq!(config.model, "session-model");
        assert_eq!(config.max_tokens, 200);
        assert_eq!(config.temperature, 1.5);

        let without_direct = ConfigSources {
            direct_api_key: Some(" ".to_string()),
            ..sources
        };
        assert_eq!(without_direct.resolve().unwrap().api_key(), "sk-session");
    }

    #[test]
    fn test_process_env_is_last_resort() {
        let sources = ConfigSources {
            process_env: Settings::new().with(API_KEY, "sk-env"),
            ..ConfigSources::new()
        };
        assert_eq!(sources.resolve().unwrap().api_key(), "sk-env");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = ConfigSources::new().resolve().unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey);
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let bad_tokens = ConfigSources::new()
            .with_direct_key("sk")
            .with_env_block("MAX_TOKENS=lots");
        assert!(matches!(
            bad_tokens.resolve(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == MAX_TOKENS
        ));

        let zero_tokens = ConfigSources::new()
            .with_direct_key("sk")
            .with_env_block("MAX_TOKENS=0");
        assert!(zero_tokens.resolve().is_err());

        let hot = ConfigSources::new()
            .with_direct_key("sk")
            .with_env_block("TEMPERATURE=2.5");
        assert!(matches!(
            hot.resolve(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == TEMPERATURE
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = ConfigSources::new()
            .with_direct_key("sk")
            .with_env_block("OPENAI_BASE_URL=http://localhost:8080/v1/\nREQUEST_TIMEOUT_SECS=5")
            .resolve()
            .unwrap();
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let config = ConfigSources::new()
            .with_direct_key("sk-supersecret9876")
            .resolve()
            .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("***9876"));
    }

    #[test]
    fn test_base_url_must_be_http_url() {
        let rejected = [
            "localhost:8080/v1",
            "not a url",
            "ftp://example.com/v1",
            "file:///tmp",
        ];
        for raw in rejected {
            let result = ConfigSources::new()
                .with_direct_key("sk")
                .with_env_block(&format!("OPENAI_BASE_URL={}", raw))
                .resolve();
            assert!(
                matches!(result, Err(ConfigError::InvalidValue { ref key, .. }) if key == BASE_URL),
                "{} resolved to {:?}",
                raw,
                result
            );
        }

        let config = ConfigSources::new()
            .with_direct_key("sk")
            .with_env_block("OPENAI_BASE_URL=https://proxy.internal:8443/openai/v1")
            .resolve()
            .unwrap();
        assert_eq!(config.base_url, "https://proxy.internal:8443/openai/v1");
    }

    #[test]
    fn test_check_setting() {
        assert!(check_setting(MAX_TOKENS, "250").is_ok());
        assert!(check_setting(MAX_TOKENS, "-1").is_err());
        assert!(check_setting(TEMPERATURE, "hot").is_err());
        assert!(check_setting(BASE_URL, "localhost:8080").is_err());
        assert!(check_setting(REQUEST_TIMEOUT_SECS, "ten").is_err());
        assert!(check_setting(REQUEST_TIMEOUT_SECS, "  ").is_ok());
        assert!(check_setting(MODEL, "anything goes").is_ok());
    }

    #[test]
    fn test_settings_validate() {
        let good = Settings::parse_env_content("OPENAI_MODEL=gpt-4o\nMAX_TOKENS=10\nOTHER=x");
        assert!(good.validate().is_ok());

        let bad = Settings::parse_env_content("OPENAI_MODEL=gpt-4o\nREQUEST_TIMEOUT_SECS=ten");
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == REQUEST_TIMEOUT_SECS
        ));
    }
}
