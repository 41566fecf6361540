//! Common imports for typical widget usage.
//!
//! This module exports the types a host needs to wire a transport, a store and
//! a renderer into a consumer with fewer import lines.
pub use crate::{
    ChatBackend, ChatClient, ChatClientConfig, ChatConsumer, ChatError, ChatMessage,
    ChatResultStream, ChatStore, ConsumerOptions, ConsumerPhase, EventStatus, MarkdownRenderer,
    PulldownMarkdownRenderer, StoreError, StreamEvent, SubmitOutcome, Turn,
};
