//! Stream consumer and incremental renderer.
//!
//! [`ChatConsumer`] owns the live message list and the answer buffer of the
//! request in flight. It pulls one event at a time from the backend stream,
//! keeps the UI signals (`phase`, progress label, live answer HTML) current,
//! and commits finished messages to the [`ChatStore`].
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::errors::{ChatError, StoreError};
use crate::event::{EventStatus, StreamEvent};
use crate::message::ChatMessage;
use crate::progress::progress_label;
use crate::render::{MarkdownRenderer, escape_html, render_or_escape};
use crate::store::ChatStore;
use crate::transport::{ChatBackend, ChatResultStream, DEFAULT_TIMEOUT};

/// Where the consumer is in the request lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerPhase {
    /// No request in flight.
    Idle,
    /// Request sent, no output delta received yet.
    Awaiting,
    /// At least one output delta consumed.
    Streaming,
}

/// Why a submission did not start a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Query was empty after trimming.
    EmptyQuery,
    /// A request is already in flight.
    Busy,
}

/// Result of [`ChatConsumer::submit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing was sent or persisted.
    Ignored(IgnoreReason),
    /// The stream completed and the answer was committed.
    Answered,
    /// The request failed; the error text was committed as the answer.
    Failed(ChatError),
}

/// Per-consumer request options.
#[derive(Clone, Debug)]
pub struct ConsumerOptions {
    /// Page the widget is embedded in.
    pub page_url: String,
    /// Timeout handed to the backend for each request.
    pub timeout: Duration,
    /// On a mid-stream error, keep the partial answer ahead of the error text
    /// instead of replacing it.
    pub keep_partial_on_error: bool,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            page_url: String::new(),
            timeout: DEFAULT_TIMEOUT,
            keep_partial_on_error: false,
        }
    }
}

impl ConsumerOptions {
    pub fn page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = page_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn keep_partial_on_error(mut self, keep: bool) -> Self {
        self.keep_partial_on_error = keep;
        self
    }
}

/// Drives one conversation: submits queries, renders streamed answers and
/// persists history.
pub struct ChatConsumer {
    backend: Arc<dyn ChatBackend>,
    store: Arc<ChatStore>,
    renderer: Arc<dyn MarkdownRenderer>,
    options: ConsumerOptions,
    messages: Vec<ChatMessage>,
    signals: Arc<Signals>,
}

/// Observable state of the request in flight.
struct Signals {
    phase: watch::Sender<ConsumerPhase>,
    progress: watch::Sender<Option<String>>,
    live: watch::Sender<String>,
}

impl Signals {
    fn new() -> Self {
        Self {
            phase: watch::channel(ConsumerPhase::Idle).0,
            progress: watch::channel(None).0,
            live: watch::channel(String::new()).0,
        }
    }

    fn reset(&self) {
        self.phase.send_replace(ConsumerPhase::Idle);
        self.progress.send_replace(None);
        self.live.send_replace(String::new());
    }
}

/// Marks a request as in flight; dropping it returns the signals to idle,
/// also when the `submit` future itself is dropped mid-stream.
struct InFlight(Arc<Signals>);

impl InFlight {
    fn start(signals: Arc<Signals>) -> Self {
        signals.phase.send_replace(ConsumerPhase::Awaiting);
        Self(signals)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.reset();
    }
}

impl ChatConsumer {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        store: Arc<ChatStore>,
        renderer: Arc<dyn MarkdownRenderer>,
        options: ConsumerOptions,
    ) -> Self {
        Self {
            backend,
            store,
            renderer,
            options,
            messages: Vec::new(),
            signals: Arc::new(Signals::new()),
        }
    }

    /// Committed messages in display order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn phase(&self) -> ConsumerPhase {
        *self.signals.phase.borrow()
    }

    /// True from submission until the answer is committed.
    pub fn is_awaiting(&self) -> bool {
        self.phase() != ConsumerPhase::Idle
    }

    /// Transient status text ("Thinking…", "Reading …"), never persisted.
    pub fn progress_label(&self) -> Option<String> {
        self.signals.progress.borrow().clone()
    }

    /// HTML of the answer currently streaming in.
    pub fn live_html(&self) -> String {
        self.signals.live.borrow().clone()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ConsumerPhase> {
        self.signals.phase.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<Option<String>> {
        self.signals.progress.subscribe()
    }

    pub fn subscribe_live(&self) -> watch::Receiver<String> {
        self.signals.live.subscribe()
    }

    /// Replaces the live message list with the stored history.
    pub async fn load_history(&mut self) -> usize {
        self.messages = self.store.get_all_messages().await;
        self.messages.len()
    }

    /// Submits a query and consumes the streamed answer to completion.
    ///
    /// Transport failures are committed as an assistant message and reported
    /// as [`SubmitOutcome::Failed`]; only store write failures return `Err`.
    pub async fn submit(&mut self, query: &str) -> Result<SubmitOutcome, StoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SubmitOutcome::Ignored(IgnoreReason::EmptyQuery));
        }
        if self.is_awaiting() {
            debug!("submission ignored while a request is in flight");
            return Ok(SubmitOutcome::Ignored(IgnoreReason::Busy));
        }

        self.commit(ChatMessage::user(escape_html(query))).await?;
        let _in_flight = InFlight::start(self.signals.clone());
        self.run_request(query).await
    }

    /// Clears the conversation on the server (best effort) and locally.
    ///
    /// Returns whether the server acknowledged the clear. Local state is
    /// cleared regardless.
    pub async fn clear_session(&mut self) -> Result<bool, StoreError> {
        let session_id = self.store.get_session_id().await;
        let remote_cleared = self
            .backend
            .clear_history(&session_id, self.options.timeout)
            .await;
        if !remote_cleared {
            warn!("server-side history was not cleared");
        }
        self.store.clear_all().await?;
        self.messages.clear();
        Ok(remote_cleared)
    }

    async fn run_request(&mut self, query: &str) -> Result<SubmitOutcome, StoreError> {
        let request_id = uuid::Uuid::new_v4();
        let sent_session_id = self.store.get_session_id().await;
        info!(%request_id, session_id = %sent_session_id, "chat request started");

        let started = self
            .backend
            .generate_response(
                query,
                &sent_session_id,
                &self.options.page_url,
                self.options.timeout,
            )
            .await;
        let ChatResultStream {
            session_id,
            mut stream,
        } = match started {
            Ok(result) => result,
            Err(e) => {
                warn!(%request_id, error = ?e, "chat request failed");
                self.signals.reset();
                self.commit(ChatMessage::assistant(error_html(&e))).await?;
                return Ok(SubmitOutcome::Failed(e));
            }
        };

        if !session_id.is_empty() && session_id != sent_session_id {
            debug!(%request_id, %session_id, "session id changed");
            self.store.save_session_id(&session_id).await?;
        }

        let mut buffer = String::new();
        let mut rendered = String::new();
        let mut failure: Option<ChatError> = None;
        while let Some(item) = stream.next().await {
            match item {
                Ok(StreamEvent::Output { delta, .. }) => {
                    if self.phase() == ConsumerPhase::Awaiting {
                        self.signals.phase.send_replace(ConsumerPhase::Streaming);
                    }
                    self.signals.progress.send_replace(None);
                    buffer.push_str(&delta);
                    // Sub-line formatting is assumed stable until the line ends.
                    if delta.contains('\n') {
                        rendered = render_or_escape(self.renderer.as_ref(), &buffer);
                    } else {
                        rendered.push_str(&delta);
                    }
                    self.signals.live.send_replace(rendered.clone());
                }
                Ok(event) => {
                    let Some(label) = progress_label(&event) else {
                        continue;
                    };
                    if matches!(
                        event,
                        StreamEvent::FunctionCall {
                            status: EventStatus::Completed,
                            ..
                        }
                    ) {
                        self.commit(ChatMessage::status(escape_html(&label))).await?;
                    }
                    self.signals.progress.send_replace(Some(label));
                }
                Err(e) => {
                    warn!(%request_id, error = ?e, received = buffer.len(), "chat stream failed");
                    failure = Some(e);
                    break;
                }
            }
        }
        drop(stream);

        let content = match &failure {
            None => render_or_escape(self.renderer.as_ref(), &buffer),
            Some(e) if self.options.keep_partial_on_error && !buffer.trim().is_empty() => {
                format!(
                    "{}{}",
                    render_or_escape(self.renderer.as_ref(), &buffer),
                    error_html(e)
                )
            }
            Some(e) => error_html(e),
        };
        self.commit(ChatMessage::assistant(content)).await?;
        info!(%request_id, chars = buffer.len(), failed = failure.is_some(), "chat request finished");

        Ok(match failure {
            None => SubmitOutcome::Answered,
            Some(e) => SubmitOutcome::Failed(e),
        })
    }

    async fn commit(&mut self, message: ChatMessage) -> Result<(), StoreError> {
        self.store.append_message(&message).await?;
        self.messages.push(message);
        Ok(())
    }
}

fn error_html(err: &ChatError) -> String {
    format!("<p>{}</p>", escape_html(&err.to_string()))
}
