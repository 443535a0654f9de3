use std::time::Duration;

use crate::error::ConfigError;
use crate::format::ResponseFormat;

pub const DEFAULT_BASE_URL: &str = "https://api.terminal49.com/v2";
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_API_TOKEN: &str = "T49_API_TOKEN";
pub const ENV_BASE_URL: &str = "T49_API_BASE_URL";
pub const ENV_MAX_RETRIES: &str = "T49_MAX_RETRIES";
pub const ENV_DEFAULT_FORMAT: &str = "T49_DEFAULT_FORMAT";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_token: String,
    pub base_url: String,
    /// Retries for 429 and 5xx responses, on top of the first request.
    pub max_retries: u32,
    /// Response shape used when a call does not ask for one.
    pub default_format: ResponseFormat,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            default_format: ResponseFormat::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_default_format(mut self, format: ResponseFormat) -> Self {
        self.default_format = format;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let token = get(ENV_API_TOKEN).ok_or(ConfigError::MissingToken)?;
        let mut config = ClientConfig::new(token);

        if let Some(base_url) = get(ENV_BASE_URL) {
            config = config.with_base_url(&base_url);
        }
        if let Some(retries) = get(ENV_MAX_RETRIES) {
            let retries = retries.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_MAX_RETRIES,
                value: retries.clone(),
            })?;
            config = config.with_max_retries(retries);
        }
        if let Some(format) = get(ENV_DEFAULT_FORMAT) {
            let format = format.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_DEFAULT_FORMAT,
                value: format.clone(),
            })?;
            config = config.with_default_format(format);
        }
        Ok(config)
    }
}

/// Trims trailing slashes and points a bare host at `/v2`. Inputs without a scheme
/// are returned as given.
pub fn normalize_base_url(input: &str) -> String {
    let input = input.trim();
    if input.is_empty() {
        return DEFAULT_BASE_URL.to_string();
    }
    let Some(scheme_end) = input.find("://") else {
        return input.to_string();
    };

    let trimmed = input.trim_end_matches('/');
    let after_scheme = &trimmed[scheme_end + 3..];
    if after_scheme.contains('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v2")
    }
}
