//! Message domain types.
//!
//! A [`Message`] is one turn of a conversation. Callers hand the toolkit
//! loosely shaped input (bare text, a role/content pair, or a finished
//! message); [`MessageInput`] is the closed set of those shapes and
//! [`normalize`] turns any mix of them into messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::InjectionError;
use crate::time::format_timestamp;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (personas, command output, reminders)
    System,
    /// The end user
    User,
    /// The language model
    Assistant,
    /// Emitted by a command handler to abort the command loop. Never sent to
    /// the model and never stored.
    Quit,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Quit => "quit",
        }
    }

    /// Capitalized name used in rendered transcripts.
    pub fn title(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Quit => "Quit",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = InjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "quit" => Ok(Role::Quit),
            other => Err(InjectionError::InvalidRole(other.to_string())),
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content (grows while a streamed reply arrives)
    pub content: String,

    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message with the given role, stamped now.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self::at(role, content, Utc::now())
    }

    /// Create a message with an explicit timestamp.
    pub fn at(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// The abort signal a command handler returns when the user declines.
    pub fn quit() -> Self {
        Self::new(Role::Quit, "")
    }

    /// Render as a markdown blockquote under a role/timestamp header.
    pub fn markdown(&self, truncation: Option<usize>) -> String {
        format!(
            "#### [{}](##### \"{}\"):\n\n{}",
            self.role.title(),
            format_timestamp(self.timestamp),
            blockquote(&self.content, truncation)
        )
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}: {}",
            self.role.title(),
            format_timestamp(self.timestamp),
            self.content
        )
    }
}

/// Quote text as a markdown blockquote, optionally keeping only the first
/// `truncation` characters.
pub fn blockquote(text: &str, truncation: Option<usize>) -> String {
    let text = match truncation {
        Some(n) => text.chars().take(n).collect::<String>(),
        None => text.to_string(),
    };
    format!("> {}", text.trim().replace('\n', "\n> "))
}

/// The accepted shapes of message input.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageInput {
    /// Bare text; takes the role chosen by the caller.
    Text(String),
    /// An explicit role/content pair.
    Pair { role: Role, content: String },
    /// A finished message, used as-is.
    Message(Message),
}

impl MessageInput {
    /// Build from a loosely typed JSON value: a string or a
    /// `{"role": ..., "content": ...}` object.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, InjectionError> {
        match value {
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_json::Value::Object(map) => {
                let content = match map.get("content") {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    None | Some(serde_json::Value::Null) => String::new(),
                    Some(other) => {
                        return Err(InjectionError::InvalidShape(format!(
                            "content must be text, got {other}"
                        )));
                    }
                };
                match map.get("role") {
                    Some(serde_json::Value::String(r)) => Ok(Self::Pair {
                        role: r.parse()?,
                        content,
                    }),
                    None => Ok(Self::Text(content)),
                    Some(other) => Err(InjectionError::InvalidShape(format!(
                        "role must be text, got {other}"
                    ))),
                }
            }
            other => Err(InjectionError::InvalidShape(format!(
                "expected text or a role/content object, got {other}"
            ))),
        }
    }

    /// Build a list from a JSON string, object, or array of those.
    pub fn list_from_value(value: &serde_json::Value) -> Result<Vec<Self>, InjectionError> {
        match value {
            serde_json::Value::Array(items) => items.iter().map(Self::from_value).collect(),
            single => Ok(vec![Self::from_value(single)?]),
        }
    }

    /// Resolve into a message, using `default_role` for bare text.
    pub fn into_message(self, default_role: Role) -> Message {
        match self {
            MessageInput::Text(content) => Message::new(default_role, content),
            MessageInput::Pair { role, content } => Message::new(role, content),
            MessageInput::Message(message) => message,
        }
    }
}

impl From<&str> for MessageInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MessageInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<(Role, &str)> for MessageInput {
    fn from((role, content): (Role, &str)) -> Self {
        Self::Pair {
            role,
            content: content.to_string(),
        }
    }
}

impl From<(Role, String)> for MessageInput {
    fn from((role, content): (Role, String)) -> Self {
        Self::Pair { role, content }
    }
}

impl From<Message> for MessageInput {
    fn from(m: Message) -> Self {
        Self::Message(m)
    }
}

/// Normalize any mix of inputs into messages.
pub fn normalize<I>(inputs: I, default_role: Role) -> Vec<Message>
where
    I: IntoIterator,
    I::Item: Into<MessageInput>,
{
    inputs
        .into_iter()
        .map(|i| i.into().into_message(default_role))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, bot!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, bot!");
    }

    #[test]
    fn display_has_role_and_content() {
        let msg = Message::assistant("Hi there");
        let line = msg.to_string();
        assert!(line.starts_with("Assistant, ["));
        assert!(line.ends_with("]: Hi there"));
    }

    #[test]
    fn markdown_quotes_every_line() {
        let msg = Message::user("  line one\nline two  ");
        let md = msg.markdown(None);
        assert!(md.starts_with("#### [User](##### \"["));
        assert!(md.ends_with("> line one\n> line two"));
    }

    #[test]
    fn markdown_truncates() {
        let msg = Message::user("abcdefgh");
        assert!(msg.markdown(Some(3)).ends_with("> abc"));
    }

    #[test]
    fn role_parsing() {
        assert_eq!("Assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!(
            "wizard".parse::<Role>().unwrap_err(),
            InjectionError::InvalidRole("wizard".into())
        );
    }

    #[test]
    fn normalize_mixed_inputs() {
        let inputs: Vec<MessageInput> = vec![
            "be nice".into(),
            (Role::Assistant, "ok").into(),
            Message::user("hi").into(),
        ];
        let messages = normalize(inputs, Role::System);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[2].role, Role::User);
    }

    #[test]
    fn input_from_json_shapes() {
        let list = MessageInput::list_from_value(&json!([
            "plain",
            {"role": "user", "content": "hi"},
            {"content": "no role"}
        ]))
        .unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(
            list[1],
            MessageInput::Pair {
                role: Role::User,
                content: "hi".into()
            }
        );

        let single = MessageInput::list_from_value(&json!("just text")).unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn input_from_json_rejects_bad_shapes() {
        assert!(matches!(
            MessageInput::from_value(&json!(42)),
            Err(InjectionError::InvalidShape(_))
        ));
        assert!(matches!(
            MessageInput::from_value(&json!({"role": 1, "content": "x"})),
            Err(InjectionError::InvalidShape(_))
        ));
        assert!(matches!(
            MessageInput::from_value(&json!({"role": "user", "content": ["x"]})),
            Err(InjectionError::InvalidShape(_))
        ));
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::user("Test message");
        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, msg);
    }
}
