//! Conversation — the append-only message log plus its active registries.
//!
//! The message list is the sole source of truth for the context sent to the
//! model. Commands and reminder-bearing injections are kept in
//! insertion-ordered registries deduplicated by key, so the first command
//! registered wins a tie and resumed conversations behave reproducibly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::Command;
use crate::error::InjectionError;
use crate::injection::Injection;
use crate::message::{Message, MessageInput, Role, blockquote, normalize};
use crate::text::plural;
use crate::time::{format_timestamp, parse_timestamp_label};

/// Anything that can be appended to a conversation.
#[derive(Debug, Clone)]
pub enum Entry {
    Messages(Vec<MessageInput>),
    Injection(Injection),
    Command(Command),
}

impl From<&str> for Entry {
    fn from(text: &str) -> Self {
        Entry::Messages(vec![MessageInput::from(text)])
    }
}

impl From<String> for Entry {
    fn from(text: String) -> Self {
        Entry::Messages(vec![MessageInput::from(text)])
    }
}

impl From<Message> for Entry {
    fn from(message: Message) -> Self {
        Entry::Messages(vec![MessageInput::Message(message)])
    }
}

impl From<Vec<Message>> for Entry {
    fn from(messages: Vec<Message>) -> Self {
        Entry::Messages(messages.into_iter().map(MessageInput::Message).collect())
    }
}

impl From<Vec<MessageInput>> for Entry {
    fn from(inputs: Vec<MessageInput>) -> Self {
        Entry::Messages(inputs)
    }
}

impl From<Injection> for Entry {
    fn from(injection: Injection) -> Self {
        Entry::Injection(injection)
    }
}

impl From<Command> for Entry {
    fn from(command: Command) -> Self {
        Entry::Command(command)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Chronological message log
    pub messages: Vec<Message>,

    /// Active commands (handlers are not serializable)
    #[serde(skip)]
    commands: Vec<Command>,

    /// Keys of every command ever registered, so a resumed conversation can
    /// rebind handlers without re-appending their injections
    #[serde(default)]
    command_keys: Vec<String>,

    /// Reminder-bearing injections, ticked after each model round-trip
    #[serde(default)]
    reminders: Vec<Injection>,

    pub title: Option<String>,

    /// Archive file stem, assigned on first save
    pub filename: Option<String>,

    pub created_at: DateTime<Utc>,
    pub touched_at: DateTime<Utc>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            messages: Vec::new(),
            commands: Vec::new(),
            command_keys: Vec::new(),
            reminders: Vec::new(),
            title: None,
            filename: None,
            created_at: now,
            touched_at: now,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn reminders(&self) -> &[Injection] {
        &self.reminders
    }

    pub fn touch(&mut self) {
        self.touched_at = Utc::now();
    }

    /// Append an entry. Bare text takes `role`; injections and commands keep
    /// the roles they were built with. Returns how many messages were added.
    pub fn append(&mut self, entry: impl Into<Entry>, role: Role) -> usize {
        match entry.into() {
            Entry::Messages(inputs) => self.push_messages(normalize(inputs, role)),
            Entry::Injection(injection) => self.apply_injection(injection),
            Entry::Command(command) => self.register_command(command),
        }
    }

    fn push_messages(&mut self, messages: Vec<Message>) -> usize {
        let before = self.messages.len();
        self.messages
            .extend(messages.into_iter().filter(|m| m.role != Role::Quit));
        self.messages.len() - before
    }

    fn apply_injection(&mut self, injection: Injection) -> usize {
        if !injection.has_reminders() {
            return self.push_messages(injection.injection_messages);
        }
        let key = injection.key();
        if self.reminders.iter().any(|r| r.key() == key) {
            debug!("Reminder injection already registered");
            return 0;
        }
        let added = self.push_messages(injection.injection_messages.clone());
        self.reminders.push(injection);
        added
    }

    fn register_command(&mut self, command: Command) -> usize {
        let key = command.key();
        if self.commands.iter().any(|c| c.key() == key) {
            return 0;
        }
        let added = if self.command_keys.contains(&key) {
            debug!(keyword = command.keyword(), "Rebinding command handler");
            0
        } else {
            self.command_keys.push(key);
            self.apply_injection(command.injection().clone())
        };
        debug!(keyword = command.keyword(), "Registered command");
        self.commands.push(command);
        added
    }

    /// Remove the last `n` messages (clamped). A non-zero erase resets the
    /// creation marker so the archive keeps the pre-erase record.
    pub fn erase(&mut self, n: usize) -> usize {
        let n = n.min(self.messages.len());
        if n > 0 {
            debug!("Trimming last {n} {} from chat", plural("message", n));
            self.messages.truncate(self.messages.len() - n);
            self.created_at = self.touched_at;
        }
        n
    }

    /// Content of the final message, or the empty string.
    pub fn last_message_content(&self) -> &str {
        self.messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    /// The active command whose keyword appears leftmost in `reply`.
    /// Ties go to the command registered first.
    pub fn triggered_command(&self, reply: &str) -> Option<&Command> {
        self.commands
            .iter()
            .filter_map(|c| c.position_in(reply).map(|pos| (pos, c)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, c)| c)
    }

    /// Advance every reminder by one round-trip and append the ones that are
    /// due. Returns how many messages were added.
    pub fn tick_reminders(&mut self) -> usize {
        let due: Vec<Message> = self
            .reminders
            .iter_mut()
            .flat_map(|r| r.tick())
            .collect();
        self.push_messages(due)
    }

    /// Lazy view of the last `limit` messages (or all of them).
    pub fn transcript(&self, limit: Option<usize>, truncation: Option<usize>) -> Transcript<'_> {
        let len = self.messages.len();
        let start = limit.map_or(0, |l| len.saturating_sub(l));
        Transcript {
            messages: self.messages[start..].iter(),
            truncation,
        }
    }

    /// Plain-text transcript: `"<linestart><label> [<role>]: > text"` entries
    /// separated by blank lines. Quoted text longer than `truncation` is cut
    /// and suffixed with `...`.
    pub fn format_transcript(
        &self,
        limit: Option<usize>,
        truncation: Option<usize>,
        linestart: &str,
    ) -> String {
        self.transcript(limit, None)
            .map(|entry| {
                let quoted = blockquote(&entry.text, None);
                let quoted = match truncation {
                    Some(n) if quoted.chars().count() > n => {
                        format!("{}...", quoted.chars().take(n).collect::<String>())
                    }
                    _ => quoted,
                };
                format!(
                    "{linestart}{} [{}]: {quoted}\n",
                    format_timestamp(entry.timestamp),
                    entry.role
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Markdown transcript: one blockquote per message under a role and
    /// timestamp header.
    pub fn format_transcript_markdown(&self, limit: Option<usize>) -> String {
        self.transcript(limit, None)
            .map(|entry| entry.markdown())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// One transcript row.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub text: String,
}

impl TranscriptEntry {
    pub fn label(&self) -> String {
        format_timestamp(self.timestamp)
    }

    pub fn markdown(&self) -> String {
        format!(
            "#### [{}](##### \"{}\"):\n\n{}",
            self.role.title(),
            self.label(),
            blockquote(&self.text, None)
        )
    }
}

/// Restartable iterator over transcript rows; clone it to iterate again.
#[derive(Debug, Clone)]
pub struct Transcript<'a> {
    messages: std::slice::Iter<'a, Message>,
    truncation: Option<usize>,
}

impl Iterator for Transcript<'_> {
    type Item = TranscriptEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let message = self.messages.next()?;
        let text = match self.truncation {
            Some(n) => message.content.chars().take(n).collect(),
            None => message.content.clone(),
        };
        Some(TranscriptEntry {
            timestamp: message.timestamp,
            role: message.role,
            text,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.messages.size_hint()
    }
}

impl ExactSizeIterator for Transcript<'_> {}

/// Recover transcript rows from a markdown transcript.
///
/// Text comes back trimmed (as rendered) and timestamps at whole-second
/// precision.
pub fn parse_markdown_transcript(markdown: &str) -> Result<Vec<TranscriptEntry>, InjectionError> {
    let mut entries = Vec::new();
    let mut current: Option<(DateTime<Utc>, Role, Vec<String>)> = None;

    for line in markdown.lines() {
        if let Some(header) = line.strip_prefix("#### [") {
            if let Some((timestamp, role, lines)) = current.take() {
                entries.push(finish_entry(timestamp, role, lines));
            }
            let (role, rest) = header
                .split_once("](##### \"")
                .ok_or_else(|| InjectionError::InvalidShape(format!("bad header: {line}")))?;
            let label = rest
                .strip_suffix("\"):")
                .ok_or_else(|| InjectionError::InvalidShape(format!("bad header: {line}")))?;
            let timestamp = parse_timestamp_label(label)
                .ok_or_else(|| InjectionError::InvalidShape(format!("bad timestamp: {label}")))?;
            current = Some((timestamp, role.parse()?, Vec::new()));
        } else if let Some((_, _, lines)) = current.as_mut() {
            if let Some(quoted) = line.strip_prefix('>') {
                lines.push(quoted.strip_prefix(' ').unwrap_or(quoted).to_string());
            }
        } else if !line.trim().is_empty() {
            return Err(InjectionError::InvalidShape(format!(
                "text before first header: {line}"
            )));
        }
    }
    if let Some((timestamp, role, lines)) = current {
        entries.push(finish_entry(timestamp, role, lines));
    }
    Ok(entries)
}

fn finish_entry(timestamp: DateTime<Utc>, role: Role, lines: Vec<String>) -> TranscriptEntry {
    TranscriptEntry {
        timestamp,
        role,
        text: lines.join("\n"),
    }
}
