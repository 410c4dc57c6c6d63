//! Environment-driven configuration.

use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_IMAP_HOST: &str = "imap.qq.com";
pub const DEFAULT_IMAP_PORT: u16 = 993;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// OpenAI-compatible chat-completions surface of the Gemini API.
pub const GEMINI_CHAT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";

/// IMAP account settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
}

/// Classifier settings. The endpoint is a field so tests can point it at a
/// local server; production always uses [`GEMINI_CHAT_ENDPOINT`].
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub api_key: SecretString,
    pub model: String,
}

/// Bark push relay settings.
#[derive(Debug, Clone)]
pub struct BarkConfig {
    pub base_url: String,
    pub device_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mail: MailConfig,
    pub classifier: ClassifierConfig,
    pub bark: BarkConfig,
    pub poll_interval_secs: u64,
}

impl Config {
    /// Build config from environment variables.
    ///
    /// Only the Bark credentials are required; everything else falls back to
    /// a default. Unparseable numeric values also fall back.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bark = BarkConfig {
            base_url: require_env("BARK_URL")?,
            device_key: require_env("BARK_KEY")?,
        };

        let mail = MailConfig {
            host: env_or("IMAP_HOST", DEFAULT_IMAP_HOST),
            port: std::env::var("IMAP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_IMAP_PORT),
            user: std::env::var("EMAIL_USER").unwrap_or_default(),
            password: SecretString::from(std::env::var("EMAIL_PASSWORD").unwrap_or_default()),
        };

        let classifier = ClassifierConfig {
            endpoint: GEMINI_CHAT_ENDPOINT.to_string(),
            api_key: SecretString::from(std::env::var("GOOGLE_API_KEY").unwrap_or_default()),
            model: env_or("GEMINI_MODEL", DEFAULT_MODEL),
        };

        let poll_interval_secs = std::env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        Ok(Self {
            mail,
            classifier,
            bark,
            poll_interval_secs,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}
