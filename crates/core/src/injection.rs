//! Injections — reusable bundles of conversation-priming messages.
//!
//! An injection is prepended to a conversation once. It may also carry a
//! reminder bundle that is re-surfaced every `reminder_period` model
//! round-trips, so persona rules stay fresh without being resent every turn.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::error::InjectionError;
use crate::message::{Message, MessageInput, Role, normalize};

/// Default number of round-trips between reminders.
pub const DEFAULT_REMINDER_PERIOD: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Injection {
    /// Messages appended when the injection is applied
    pub injection_messages: Vec<Message>,

    /// Messages re-surfaced periodically (empty = no reminders)
    #[serde(default)]
    pub reminder_messages: Vec<Message>,

    /// Ticks between reminders
    #[serde(default = "default_period")]
    pub reminder_period: u32,

    /// Ticks since the last reminder
    #[serde(default)]
    pub reminder_timer: u32,
}

fn default_period() -> u32 {
    DEFAULT_REMINDER_PERIOD
}

impl Injection {
    /// Build from any mix of inputs; bare text becomes system messages.
    pub fn new<I>(inputs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<MessageInput>,
    {
        Self::with_role(inputs, Role::System)
    }

    /// Build from any mix of inputs; bare text takes `role`.
    pub fn with_role<I>(inputs: I, role: Role) -> Self
    where
        I: IntoIterator,
        I::Item: Into<MessageInput>,
    {
        Self {
            injection_messages: normalize(inputs, role),
            reminder_messages: Vec::new(),
            reminder_period: DEFAULT_REMINDER_PERIOD,
            reminder_timer: 0,
        }
    }

    /// Build from a JSON string, role/content object, or array of those.
    pub fn from_value(value: &serde_json::Value, role: Role) -> Result<Self, InjectionError> {
        Ok(Self::with_role(MessageInput::list_from_value(value)?, role))
    }

    /// Attach a reminder bundle that fires every `period` ticks.
    pub fn reminder<I>(mut self, inputs: I, period: u32) -> Self
    where
        I: IntoIterator,
        I::Item: Into<MessageInput>,
    {
        self.reminder_messages = normalize(inputs, Role::System);
        self.reminder_period = period;
        self
    }

    /// Start the reminder counter somewhere other than zero.
    pub fn timer(mut self, ticks: u32) -> Self {
        self.reminder_timer = ticks;
        self
    }

    pub fn has_reminders(&self) -> bool {
        !self.reminder_messages.is_empty()
    }

    /// Advance the reminder counter by one round-trip.
    ///
    /// Returns fresh copies of the reminder messages when the counter reaches
    /// the period (and resets it), otherwise nothing.
    pub fn tick(&mut self) -> Vec<Message> {
        self.reminder_timer += 1;
        if self.reminder_timer >= self.reminder_period {
            self.reminder_timer = 0;
            return self
                .reminder_messages
                .iter()
                .map(|m| Message::new(m.role, m.content.clone()))
                .collect();
        }
        Vec::new()
    }

    /// Registry identity: the rendered role/content of the injection messages.
    pub fn key(&self) -> String {
        self.injection_messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl PartialEq for Injection {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Injection {}

impl Hash for Injection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_string_becomes_one_system_message() {
        let inj = Injection::new(["You are terse."]);
        assert_eq!(inj.injection_messages.len(), 1);
        assert_eq!(inj.injection_messages[0].role, Role::System);
        assert!(!inj.has_reminders());
    }

    #[test]
    fn mixed_inputs_keep_their_count() {
        let inj = Injection::new(vec![
            MessageInput::from("rule one"),
            MessageInput::from((Role::Assistant, "understood")),
            MessageInput::from(Message::user("go")),
        ]);
        assert_eq!(inj.injection_messages.len(), 3);
        let roles: Vec<Role> = inj.injection_messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::Assistant, Role::User]);
    }

    #[test]
    fn from_json_value() {
        let inj = Injection::from_value(
            &json!([{"role": "user", "content": "name?"}, "Your name is Jigli"]),
            Role::System,
        )
        .unwrap();
        assert_eq!(inj.injection_messages.len(), 2);
        assert!(Injection::from_value(&json!(3.5), Role::System).is_err());
    }

    #[test]
    fn tick_fires_on_period_and_wraps() {
        let mut inj = Injection::new(["persona"]).reminder(["remember the persona"], 3);
        assert!(inj.tick().is_empty());
        assert!(inj.tick().is_empty());
        let due = inj.tick();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].content, "remember the persona");
        assert_eq!(inj.reminder_timer, 0);

        // Second period behaves identically.
        assert!(inj.tick().is_empty());
        assert!(inj.tick().is_empty());
        assert_eq!(inj.tick().len(), 1);
    }

    #[test]
    fn tick_without_reminders_is_empty() {
        let mut inj = Injection::new(["plain"]);
        for _ in 0..10 {
            assert!(inj.tick().is_empty());
        }
    }

    #[test]
    fn preset_timer_shortens_first_period() {
        let mut inj = Injection::new(["p"]).reminder(["r"], 5).timer(4);
        assert_eq!(inj.tick().len(), 1);
    }

    #[test]
    fn equality_ignores_timestamps() {
        let a = Injection::new(["same text"]);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = Injection::new(["same text"]).reminder(["extra"], 2);
        assert_eq!(a, b);
        assert_ne!(a, Injection::new(["other text"]));
    }
}
