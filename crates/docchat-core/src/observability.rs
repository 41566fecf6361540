//! Process-wide `tracing` setup.
//!
//! Logs go to stderr by default so they never interleave with the chat
//! transcript on stdout.
//!
//! Environment variables:
//! - `DOCCHAT_OBSERVABILITY_ENABLED` / `DOCCHAT_OBSERVABILITY`: enable/disable flag (default enabled).
//! - `DOCCHAT_LOG_LEVEL`: level/filter override (`info`, `docchat_core=debug`, ...).
//! - `DOCCHAT_JSON_LOG_PATH`: write JSONL to this file instead of stderr.
//! - `RUST_LOG`: fallback filter when `DOCCHAT_LOG_LEVEL` is unset or invalid.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const DEFAULT_FILTER: &str = "warn";
const DEFAULT_LOG_FILE: &str = "docchat.logs.jsonl";

static INIT: OnceCell<()> = OnceCell::new();

/// Where log lines are written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogSink {
    /// Compact human-readable lines on stderr.
    Stderr,
    /// One JSON object per line, appended to the file.
    JsonFile(PathBuf),
}

/// Logging settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    /// Filter directive handed to [`EnvFilter`].
    pub filter: String,
    pub sink: LogSink,
}

impl LogSettings {
    /// Reads the `DOCCHAT_*` variables and `RUST_LOG`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = ["DOCCHAT_OBSERVABILITY_ENABLED", "DOCCHAT_OBSERVABILITY"]
            .into_iter()
            .find_map(|key| lookup(key))
            .map(|raw| parse_flag(&raw).unwrap_or(true))
            .unwrap_or(true);

        let filter = ["DOCCHAT_LOG_LEVEL", "RUST_LOG"]
            .into_iter()
            .filter_map(|key| lookup(key))
            .map(|raw| raw.trim().to_string())
            .find(|directive| !directive.is_empty() && EnvFilter::try_new(directive).is_ok())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());

        let sink = lookup("DOCCHAT_JSON_LOG_PATH")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map_or(LogSink::Stderr, |raw| LogSink::JsonFile(PathBuf::from(raw)));

        Self {
            enabled,
            filter,
            sink,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Splits a log file path into the directory and file name the appender wants.
fn split_log_path(path: &Path) -> (&Path, &str) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);
    (dir, file_name)
}

/// Initialize logging once per process from [`LogSettings::from_env`].
pub fn init_observability() {
    INIT.get_or_init(|| install(LogSettings::from_env()));
}

fn install(settings: LogSettings) {
    if !settings.enabled {
        return;
    }
    let filter = EnvFilter::new(&settings.filter);
    match settings.sink {
        LogSink::JsonFile(path) => {
            let (dir, file_name) = split_log_path(&path);
            let _ = std::fs::create_dir_all(dir);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(tracing_appender::rolling::never(dir, file_name));
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init();
        }
        LogSink::Stderr => {
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(vars: &[(&str, &str)]) -> LogSettings {
        LogSettings::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
    }

    #[test]
    fn defaults_to_warn_on_stderr() {
        assert_eq!(
            settings(&[]),
            LogSettings {
                enabled: true,
                filter: "warn".into(),
                sink: LogSink::Stderr,
            }
        );
    }

    #[test]
    fn level_override_beats_rust_log_unless_invalid() {
        let s = settings(&[("DOCCHAT_LOG_LEVEL", "debug"), ("RUST_LOG", "info")]);
        assert_eq!(s.filter, "debug");
        let s = settings(&[("DOCCHAT_LOG_LEVEL", "docchat=verbose"), ("RUST_LOG", "info")]);
        assert_eq!(s.filter, "info");
    }

    #[test]
    fn flag_spellings_and_json_sink() {
        assert!(!settings(&[("DOCCHAT_OBSERVABILITY", " Off ")]).enabled);
        assert!(settings(&[("DOCCHAT_OBSERVABILITY_ENABLED", "maybe")]).enabled);
        assert_eq!(
            settings(&[("DOCCHAT_JSON_LOG_PATH", "logs/chat.jsonl")]).sink,
            LogSink::JsonFile(PathBuf::from("logs/chat.jsonl"))
        );
    }

    #[test]
    fn bare_file_name_logs_to_current_dir() {
        assert_eq!(
            split_log_path(Path::new("chat.jsonl")),
            (Path::new("."), "chat.jsonl")
        );
    }

    #[test]
    fn init_is_idempotent() {
        init_observability();
        init_observability();
        assert!(INIT.get().is_some());
    }
}
