//! Streaming response pipeline of the documentation chat widget.
//!
//! Bytes from the chat backend flow through [`decoder`] (NDJSON segments to
//! JSON objects), [`event`] (objects to typed [`StreamEvent`]s) and into the
//! [`ChatConsumer`], which renders the answer incrementally and commits
//! history to the [`ChatStore`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use docchat_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ChatClient::new(ChatClientConfig::new("https://docs.example.com/api"))?;
//! let store = ChatStore::new("docchat.sqlite3");
//! let mut consumer = ChatConsumer::new(
//!     Arc::new(client),
//!     Arc::new(store),
//!     Arc::new(PulldownMarkdownRenderer),
//!     ConsumerOptions::default().page_url("https://docs.example.com/start"),
//! );
//!
//! consumer.submit("How do I install the SDK?").await?;
//! for message in consumer.messages() {
//!     println!("{}: {}", message.turn, message.content);
//! }
//! # Ok(())
//! # }
//! ```

/// Consumer state machine and incremental renderer.
pub mod consumer;
/// Incremental NDJSON decoding.
pub mod decoder;
/// Public error types.
pub mod errors;
/// Typed stream events and validation.
pub mod event;
/// Chat message entity.
pub mod message;
/// Logging setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Progress labels for reasoning and tool events.
pub mod progress;
/// Markdown rendering.
pub mod render;
/// Local SQLite persistence.
pub mod store;
/// HTTP transport to the chat backend.
pub mod transport;

pub use consumer::{ChatConsumer, ConsumerOptions, ConsumerPhase, IgnoreReason, SubmitOutcome};
pub use decoder::{JsonObject, NdjsonDecoder, decode_json_stream};
pub use errors::{ChatError, StoreError};
pub use event::{EventStatus, StreamEvent, validate_events};
pub use message::{ChatMessage, Turn};
pub use render::{MarkdownRenderer, PulldownMarkdownRenderer, RenderError, escape_html};
pub use store::ChatStore;
pub use transport::{ChatBackend, ChatClient, ChatClientConfig, ChatResultStream, EventStream};
