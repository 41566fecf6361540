use std::fmt;
use std::str::FromStr;

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Turn {
    /// Reader of the documentation.
    User,
    /// The documentation assistant.
    Assistant,
}

impl Turn {
    /// Returns the stored string form (`user` / `assistant`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Turn {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown turn: {other}")),
        }
    }
}

/// One entry of the conversation history.
///
/// `content` is HTML. Entries with `final == false` are progress annotations
/// (for example "Read pages: …") kept for history display; `final == true`
/// marks a genuine conversational turn.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub turn: Turn,
    pub content: String,
    #[serde(rename = "final")]
    pub is_final: bool,
}

impl ChatMessage {
    /// A final user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            turn: Turn::User,
            content: content.into(),
            is_final: true,
        }
    }

    /// A final assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            turn: Turn::Assistant,
            content: content.into(),
            is_final: true,
        }
    }

    /// A non-final assistant status entry.
    pub fn status(content: impl Into<String>) -> Self {
        Self {
            turn: Turn::Assistant,
            content: content.into(),
            is_final: false,
        }
    }
}
