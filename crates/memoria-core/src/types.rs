use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of a [`Message`], used for role labels and partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    System,
    User,
    Assistant,
    ToolResult,
}

impl MessageKind {
    /// Role label used when rendering a transcript line.
    pub fn label(&self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::ToolResult => "Tool result",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::ToolResult => write!(f, "tool_result"),
        }
    }
}

/// A single turn of a stored conversation.
///
/// Messages are plain values. Compaction never edits one in place; it builds
/// a new sequence out of kept messages and freshly created summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
    },
    ToolResult {
        content: String,
        /// Name of the tool that produced the result, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    pub fn tool_result(tool_name: Option<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            content: content.into(),
            tool_name,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::System { .. } => MessageKind::System,
            Self::User { .. } => MessageKind::User,
            Self::Assistant { .. } => MessageKind::Assistant,
            Self::ToolResult { .. } => MessageKind::ToolResult,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::System { content }
            | Self::User { content }
            | Self::Assistant { content }
            | Self::ToolResult { content, .. } => content,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }
}

/// When the batch compaction pass fires. All times are UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Repeat every N seconds, measured from the previous fire.
    Interval { every_secs: u64 },

    /// Fire once per hour at the given minute.
    Hourly { minute: u8 },

    /// Fire every day at HH:MM.
    Daily { hour: u8, minute: u8 },
}

impl Default for Schedule {
    /// Top of every hour.
    fn default() -> Self {
        Self::Hourly { minute: 0 }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval { every_secs } => write!(f, "every {every_secs}s"),
            Self::Hourly { minute } => write!(f, "hourly at :{minute:02}"),
            Self::Daily { hour, minute } => write!(f, "daily at {hour:02}:{minute:02} UTC"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_with_role_tag() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn tool_result_omits_missing_tool_name() {
        let json = serde_json::to_string(&Message::tool_result(None, "42")).unwrap();
        assert_eq!(json, r#"{"role":"tool_result","content":"42"}"#);

        let parsed: Message =
            serde_json::from_str(r#"{"role":"tool_result","content":"ok","tool_name":"booking"}"#)
                .unwrap();
        assert_eq!(parsed.kind(), MessageKind::ToolResult);
        assert_eq!(parsed.text(), "ok");
    }

    #[test]
    fn kind_labels() {
        assert_eq!(MessageKind::ToolResult.label(), "Tool result");
        assert_eq!(Message::system("s").kind().label(), "System");
        assert!(Message::system("s").is_system());
        assert!(!Message::assistant("a").is_system());
    }

    #[test]
    fn schedule_parses_from_tagged_json() {
        let s: Schedule = serde_json::from_str(r#"{"kind":"daily","hour":3,"minute":30}"#).unwrap();
        assert_eq!(s, Schedule::Daily { hour: 3, minute: 30 });
        assert_eq!(Schedule::default(), Schedule::Hourly { minute: 0 });
    }
}
