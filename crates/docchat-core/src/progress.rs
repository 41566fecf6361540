//! Human-readable status text for reasoning and tool events.
use serde_json::Value;

use crate::decoder::JsonObject;
use crate::event::{EventStatus, StreamEvent};

/// Returns the progress label for a reasoning or tool event, `None` for output.
pub fn progress_label(event: &StreamEvent) -> Option<String> {
    match event {
        StreamEvent::Reasoning {
            status: EventStatus::InProgress,
        } => Some("Thinking…".to_string()),
        StreamEvent::Reasoning {
            status: EventStatus::Completed,
        } => Some("Preparing answer…".to_string()),
        StreamEvent::FunctionCall {
            status,
            name,
            arguments,
        } => Some(tool_label(*status, name, arguments.as_ref())),
        StreamEvent::Output { .. } => None,
    }
}

fn tool_label(status: EventStatus, name: &str, arguments: Option<&JsonObject>) -> String {
    let done = status == EventStatus::Completed;
    match name {
        "fetch_page_content" => {
            let urls = string_list(arguments, "urls")
                .or_else(|| string_list(arguments, "url"))
                .unwrap_or_default();
            match (done, urls.is_empty()) {
                (false, true) => "Reading pages…".to_string(),
                (true, true) => "Read pages".to_string(),
                (false, false) => format!("Reading {}…", urls.join(", ")),
                (true, false) => format!("Read {}", urls.join(", ")),
            }
        }
        "search" | "search_docs" | "search_documentation" | "web_search" => {
            let query = arguments
                .and_then(|args| args.get("query"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|q| !q.is_empty());
            match (done, query) {
                (false, Some(q)) => format!("Searching for \"{q}\"…"),
                (true, Some(q)) => format!("Searched for \"{q}\""),
                (false, None) => "Searching the documentation…".to_string(),
                (true, None) => "Searched the documentation".to_string(),
            }
        }
        other => {
            let readable = other.replace('_', " ");
            if done {
                format!("Used {readable}")
            } else {
                format!("Using {readable}…")
            }
        }
    }
}

/// Accepts either an array of strings or a single string under `key`.
fn string_list(arguments: Option<&JsonObject>, key: &str) -> Option<Vec<String>> {
    match arguments?.get(key)? {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(status: EventStatus, name: &str, args: Value) -> StreamEvent {
        StreamEvent::FunctionCall {
            status,
            name: name.into(),
            arguments: args.as_object().cloned(),
        }
    }

    #[test]
    fn fetch_page_lists_urls() {
        let args = json!({"urls":["https://a.dev/x","https://b.dev/y"]});
        assert_eq!(
            progress_label(&call(EventStatus::InProgress, "fetch_page_content", args.clone())),
            Some("Reading https://a.dev/x, https://b.dev/y…".into())
        );
        assert_eq!(
            progress_label(&call(EventStatus::Completed, "fetch_page_content", args)),
            Some("Read https://a.dev/x, https://b.dev/y".into())
        );
        assert_eq!(
            progress_label(&call(EventStatus::Completed, "fetch_page_content", Value::Null)),
            Some("Read pages".into())
        );
    }

    #[test]
    fn search_and_unknown_tools() {
        assert_eq!(
            progress_label(&call(EventStatus::InProgress, "search_docs", json!({"query":"install"}))),
            Some("Searching for \"install\"…".into())
        );
        assert_eq!(
            progress_label(&call(EventStatus::Completed, "list_versions", json!({}))),
            Some("Used list versions".into())
        );
    }

    #[test]
    fn output_has_no_label() {
        let event = StreamEvent::Output {
            status: EventStatus::InProgress,
            delta: "x".into(),
        };
        assert_eq!(progress_label(&event), None);
    }
}
