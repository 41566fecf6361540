/// Failures raised by the response transport, either before the event stream
/// is established or as a terminal item of that stream.
///
/// The `Display` text is what the widget shows to the reader, so it is written
/// for end users rather than for logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Server answered `429 Too Many Requests`.
    #[error("{}", rate_limited_message(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },
    /// Non-2xx status (other than 429) or a response without a body.
    #[error("The documentation assistant could not be reached. Please try again later.")]
    Unreachable { status: Option<u16> },
    /// The local timeout fired and the request was aborted.
    #[error("The assistant took too long to respond. Please try again.")]
    TimedOut,
    /// Any other network or transport fault.
    #[error("Something went wrong while contacting the assistant: {0}")]
    RequestFailed(String),
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
}

fn rate_limited_message(retry_after_secs: &Option<u64>) -> String {
    match *retry_after_secs {
        Some(1) => "Too many requests. Please try again in 1 second.".to_string(),
        Some(secs) => format!("Too many requests. Please try again in {secs} seconds."),
        None => "Too many requests. Please wait a moment and try again.".to_string(),
    }
}

impl ChatError {
    /// Maps a `reqwest` failure onto the transport taxonomy.
    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::TimedOut;
        }
        if let Some(status) = err.status() {
            return Self::Unreachable {
                status: Some(status.as_u16()),
            };
        }
        Self::RequestFailed(err.to_string())
    }
}

/// Errors surfaced by write operations on the local store.
///
/// Reads never return this type; they degrade to empty defaults instead.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Creating the database directory failed.
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    /// SQLite rejected the operation.
    #[error("store database error: {0}")]
    Database(#[from] sqlx::Error),
}
