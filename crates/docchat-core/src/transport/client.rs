use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::StreamExt as _;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use tracing::{debug, info, warn};

use crate::decoder::{ByteStream, NdjsonDecoder, decode_json_stream};
use crate::errors::ChatError;
use crate::event::validate_events;

use super::config::ChatClientConfig;
use super::{ChatBackend, ChatResultStream, SESSION_ID_HEADER};

/// Epoch-looking reset values are converted to a relative delay.
const EPOCH_THRESHOLD_SECS: u64 = 1_000_000_000;

/// `reqwest` client for the chat backend's `/chat` and `/clear` endpoints.
pub struct ChatClient {
    client: reqwest::Client,
    config: ChatClientConfig,
}

impl ChatClient {
    /// Creates a client from explicit configuration.
    pub fn new(config: ChatClientConfig) -> Result<Self, ChatError> {
        if config.base_url.trim().is_empty() {
            return Err(ChatError::Config(
                "no chat service configured: set DOCCHAT_BASE_URL or pass a base URL".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build chat client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl ChatBackend for ChatClient {
    async fn generate_response(
        &self,
        query: &str,
        session_id: &str,
        page_url: &str,
        timeout: Duration,
    ) -> Result<ChatResultStream, ChatError> {
        let body = build_chat_body(query, page_url);
        debug!(session_id, page_url, timeout_ms = timeout.as_millis() as u64, "starting chat stream");

        let response = self
            .client
            .post(self.config.chat_url())
            .header(SESSION_ID_HEADER, session_id)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "chat request failed");
                ChatError::from_reqwest(&e)
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = retry_after_secs(response.headers());
            info!(?retry_after_secs, "chat request rate limited");
            return Err(ChatError::RateLimited { retry_after_secs });
        }
        if !status.is_success()
            || status == StatusCode::NO_CONTENT
            || response.content_length() == Some(0)
        {
            warn!(status = status.as_u16(), "chat request returned no usable body");
            return Err(ChatError::Unreachable {
                status: Some(status.as_u16()),
            });
        }

        let session_id = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(session_id)
            .to_string();

        let bytes_stream: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| ChatError::from_reqwest(&e))),
        );
        let stream = validate_events(decode_json_stream(bytes_stream, NdjsonDecoder::default()));

        Ok(ChatResultStream {
            session_id,
            stream: Box::pin(stream),
        })
    }

    async fn clear_history(&self, session_id: &str, timeout: Duration) -> bool {
        let result = self
            .client
            .post(self.config.clear_url())
            .header(SESSION_ID_HEADER, session_id)
            .timeout(timeout)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = response.status().as_u16(), "clear history request rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, timed_out = e.is_timeout(), "clear history request failed");
                false
            }
        }
    }
}

pub(crate) fn build_chat_body(query: &str, page_url: &str) -> serde_json::Value {
    serde_json::json!({
        "content": query,
        "current_url": page_url,
        "stream": true,
    })
}

/// Reads the cooldown from `Retry-After`, falling back to `X-RateLimit-Reset`.
pub(crate) fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };
    if let Some(secs) = read("retry-after") {
        return Some(secs);
    }
    let reset = read("x-ratelimit-reset")?;
    if reset < EPOCH_THRESHOLD_SECS {
        return Some(reset);
    }
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    Some(reset.saturating_sub(now))
}
