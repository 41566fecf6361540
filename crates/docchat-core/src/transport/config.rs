use std::time::Duration;

use crate::errors::ChatError;

/// Default request timeout, long enough for tool-heavy answers.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for the chat backend client.
#[derive(Clone, Debug)]
pub struct ChatClientConfig {
    /// Base URL of the chat service; `/chat` and `/clear` are appended.
    pub base_url: String,
    /// Default timeout covering the whole request, body included.
    pub timeout: Duration,
}

impl ChatClientConfig {
    /// Creates a config with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Builds a config from `DOCCHAT_BASE_URL` and `DOCCHAT_TIMEOUT_SECS`.
    ///
    /// A missing base URL is left empty so callers can still supply one;
    /// [`ChatClient::new`](super::ChatClient::new) rejects it if they don't.
    /// An unparsable timeout is an error.
    pub fn from_env() -> Result<Self, ChatError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ChatError> {
        let base_url = lookup("DOCCHAT_BASE_URL").unwrap_or_default();
        let mut config = Self::new(base_url.trim());
        if let Some(raw) = lookup("DOCCHAT_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                ChatError::Config(format!("invalid DOCCHAT_TIMEOUT_SECS `{raw}`: {e}"))
            })?;
            config = config.timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Overrides the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the default timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn chat_url(&self) -> String {
        format!("{}/chat", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn clear_url(&self) -> String {
        format!("{}/clear", self.base_url.trim_end_matches('/'))
    }
}
