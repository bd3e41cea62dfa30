//! Throwaway bots: send once, return the reply, keep nothing.

use std::sync::Arc;
use tracing::warn;
use wigli_core::conversation::Entry;
use wigli_core::message::{MessageInput, Role};
use wigli_core::provider::Provider;

use crate::bot::{Bot, ChatSettings};
use crate::error::BotError;
use crate::output::OutputSink;
use crate::token::TokenCounter;

/// Title used when the titler cannot produce one.
pub const FALLBACK_TITLE: &str = "Untitled";

/// Builds one-shot bots that share a provider and settings.
#[derive(Clone)]
pub struct OneShot {
    provider: Arc<dyn Provider>,
    counter: Arc<dyn TokenCounter>,
    output: Arc<dyn OutputSink>,
    settings: ChatSettings,
}

impl OneShot {
    pub fn new(
        provider: Arc<dyn Provider>,
        counter: Arc<dyn TokenCounter>,
        output: Arc<dyn OutputSink>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            provider,
            counter,
            output,
            settings,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn counter(&self) -> &Arc<dyn TokenCounter> {
        &self.counter
    }

    /// Send `messages` to a fresh bot and return its reply.
    pub async fn run(&self, messages: impl Into<Entry>, stream: bool) -> Result<String, BotError> {
        let mut bot = Bot::new(Arc::clone(&self.provider))
            .with_counter(Arc::clone(&self.counter))
            .with_output(Arc::clone(&self.output))
            .with_settings(self.settings.clone());
        bot.inject(messages).await?;
        bot.chat(None, stream).await
    }

    /// Summarize a markdown transcript in a few words.
    pub async fn title(&self, transcript: &str) -> String {
        match self.run(title_prompt(transcript), false).await {
            Ok(reply) => {
                let title = reply.trim().trim_matches('"').trim();
                if title.is_empty() || title.starts_with("[ERROR:") {
                    FALLBACK_TITLE.to_string()
                } else {
                    title.to_string()
                }
            }
            Err(e) => {
                warn!("Auto-titling failed: {e}");
                FALLBACK_TITLE.to_string()
            }
        }
    }
}

fn title_prompt(transcript: &str) -> Vec<MessageInput> {
    vec![
        MessageInput::from((
            Role::System,
            "You are an expert at summarizing the purpose of a conversation in just a few words. \
             The user will ask you to summarize a conversation and give you the transcript. \
             You only use about two to four words, yet the core themes of the conversation are \
             clearly communicated. The next message will be the user's transcript.",
        )),
        MessageInput::from((Role::Assistant, "Titling Transcripts")),
        MessageInput::from((
            Role::User,
            format!(
                "Here is the transcript I would like you to title. Please just respond with the \
                 most concise title and nothing else.\n\n{transcript}"
            ),
        )),
    ]
}
