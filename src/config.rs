use std::env;
use std::net::SocketAddr;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "journeyline";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    format!("{APP_NAME}=info,tower_http=info")
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required env: {0}. Add it to the environment or a .env file.")]
    MissingVar(&'static str),
    #[error("Invalid value for {var}: {detail}")]
    InvalidVar { var: &'static str, detail: String },
}

/// Credentials and location of the clinical platform.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub base_url: String,
    pub api_key: String,
    pub client_id: String,
    pub client_secret: String,
    /// Long-lived user token; sent with the login exchange only when present.
    pub user_token: Option<String>,
}

/// LLM backend settings. Absent when no usable API key is configured.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub platform: PlatformConfig,
    pub llm: Option<LlmConfig>,
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// Platform credentials are required and fail fast with a clear message.
    /// The LLM key is optional: a missing or placeholder-looking key leaves
    /// `llm` as `None` and the pipeline degrades to an explicit
    /// "summarizer unavailable" envelope.
    pub fn from_env() -> Result<Self, ConfigError> {
        let platform = PlatformConfig {
            base_url: require("PLATFORM_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            api_key: require("PLATFORM_API_KEY")?,
            client_id: require("PLATFORM_CLIENT_ID")?,
            client_secret: require("PLATFORM_CLIENT_SECRET")?,
            user_token: optional("PLATFORM_USER_TOKEN"),
        };

        let llm = match optional("LLM_API_KEY") {
            Some(key) if !looks_like_placeholder_key(&key) => Some(LlmConfig {
                base_url: optional("LLM_BASE_URL")
                    .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                api_key: key,
                model: optional("LLM_MODEL")
                    .unwrap_or_else(|| "gemini-1.5-pro-latest".to_string()),
            }),
            Some(_) => {
                tracing::warn!("LLM_API_KEY looks like a placeholder; summarizer disabled");
                None
            }
            None => None,
        };

        let bind_addr = match optional("BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidVar {
                var: "BIND_ADDR",
                detail: format!("{e}"),
            })?,
            None => SocketAddr::from(([127, 0, 0, 1], 8000)),
        };

        Ok(Config {
            platform,
            llm,
            bind_addr,
        })
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    optional(var).ok_or(ConfigError::MissingVar(var))
}

fn optional(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// Heuristic for obviously-fake API keys (placeholders from sample .env
/// files, or strings too short to be real).
pub fn looks_like_placeholder_key(key: &str) -> bool {
    let key = key.trim();
    let lower = key.to_ascii_lowercase();
    if lower.starts_with("your_") || lower.starts_with("test") || lower.starts_with("abc") {
        return true;
    }
    key.len() < 20
}
