use futures::StreamExt as _;
use serde_json::Value;
use tracing::debug;

use crate::decoder::JsonObject;
use crate::errors::ChatError;

/// Lifecycle of a stream event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    InProgress,
    Completed,
}

impl EventStatus {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Typed events emitted by the chat backend.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// The model is thinking. Carries no payload.
    Reasoning { status: EventStatus },
    /// A tool invocation. `arguments` is kept only when the wire value is an
    /// object.
    FunctionCall {
        status: EventStatus,
        name: String,
        arguments: Option<JsonObject>,
    },
    /// A text fragment of the final answer.
    Output { status: EventStatus, delta: String },
}

impl StreamEvent {
    /// Narrows a decoded JSON value into a stream event.
    ///
    /// Returns `None` for anything without a recognized `type`/`status` pair or
    /// with wrongly typed variant fields. Unknown extra fields are ignored.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Self::from_object(object)
    }

    /// Same as [`StreamEvent::from_value`] for an already-unwrapped object.
    pub fn from_object(object: &JsonObject) -> Option<Self> {
        let event_type = object.get("type").and_then(Value::as_str)?;
        let status = object
            .get("status")
            .and_then(Value::as_str)
            .and_then(EventStatus::parse)?;
        match event_type {
            "reasoning" => Some(Self::Reasoning { status }),
            "function_call" => {
                let name = object.get("name").and_then(Value::as_str)?;
                let arguments = object.get("arguments").and_then(Value::as_object).cloned();
                Some(Self::FunctionCall {
                    status,
                    name: name.to_string(),
                    arguments,
                })
            }
            "output" => {
                let delta = object.get("delta").and_then(Value::as_str)?;
                Some(Self::Output {
                    status,
                    delta: delta.to_string(),
                })
            }
            _ => None,
        }
    }
}

/// Filters a decoded object stream down to valid events.
///
/// Rejected objects produce nothing; errors pass through unchanged.
pub fn validate_events<S>(
    objects: S,
) -> impl futures::Stream<Item = Result<StreamEvent, ChatError>> + Send + 'static
where
    S: futures::Stream<Item = Result<JsonObject, ChatError>> + Send + 'static,
{
    objects.filter_map(|item| async move {
        match item {
            Ok(object) => {
                let event = StreamEvent::from_object(&object);
                if event.is_none() {
                    let event_type = object
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or("<missing>");
                    debug!(event_type, "dropping unrecognized stream event");
                }
                event.map(Ok)
            }
            Err(e) => Some(Err(e)),
        }
    })
}
