//! HTTP transport to the chat backend.
//!
//! The consumer talks to the backend only through [`ChatBackend`], so tests and
//! alternative hosts can swap in their own implementation.
mod client;
mod config;

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

pub use client::ChatClient;
pub use config::{ChatClientConfig, DEFAULT_TIMEOUT};

use crate::errors::ChatError;
use crate::event::StreamEvent;

/// Header carrying the session token in both directions.
pub const SESSION_ID_HEADER: &str = "Session-ID";

/// Validated, single-pass event sequence of one response.
pub type EventStream =
    Pin<Box<dyn futures::Stream<Item = Result<StreamEvent, ChatError>> + Send + 'static>>;

/// Result of a successful `generate_response` call.
///
/// Returned as soon as response headers arrive; `stream` is consumed
/// destructively and cannot be replayed.
pub struct ChatResultStream {
    /// Session id reported by the server (or the one sent if none came back).
    pub session_id: String,
    /// Validated events in arrival order.
    pub stream: EventStream,
}

impl fmt::Debug for ChatResultStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatResultStream")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// Contract of the chat service as seen by the consumer.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends one query and returns the session id plus the event stream.
    async fn generate_response(
        &self,
        query: &str,
        session_id: &str,
        page_url: &str,
        timeout: Duration,
    ) -> Result<ChatResultStream, ChatError>;

    /// Asks the server to drop the session history. Never fails; returns
    /// `false` on any error.
    async fn clear_history(&self, session_id: &str, timeout: Duration) -> bool;
}
