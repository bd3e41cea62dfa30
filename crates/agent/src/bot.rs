//! The bot: a conversation bound to a provider, a token budget and,
//! optionally, a store that is written after every change.

use std::sync::Arc;
use tracing::{debug, error, warn};
use wigli_config::AppConfig;
use wigli_core::conversation::{Conversation, Entry};
use wigli_core::error::ProviderError;
use wigli_core::message::{Message, Role};
use wigli_core::provider::{FinishReason, Provider, ProviderRequest};
use wigli_core::store::ConversationStore;
use wigli_core::text::plural;

use crate::error::BotError;
use crate::oneshot::OneShot;
use crate::output::{OutputSink, StdoutSink};
use crate::token::{ChatMlCounter, TokenCounter};

/// Seconds a model call is nominally allowed to take. Not enforced here.
pub const TIMEOUT_SECS: u64 = 10;

pub const LIMIT_MSG: &str = "[ERROR: CONVERSATION LIMIT REACHED]";
pub const EMPTY_MSG: &str = "[ERROR: NO PROMPT]";
pub const KEY_ERR_MSG: &str = "[ERROR: NO OPENAI API KEY]";
pub const TIMEOUT_MSG: &str = "[ERROR: OPENAI FAILED TO RESPOND FOR 10 SECONDS]";

/// Generation and loop parameters.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f32,
    /// Conversations counted above this get [`LIMIT_MSG`]
    pub max_context_tokens: usize,
    /// Command cycles allowed per send
    pub max_commands: usize,
    /// Default response mode
    pub stream: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".into(),
            temperature: 1.0,
            max_context_tokens: 4096,
            max_commands: 8,
            stream: true,
        }
    }
}

impl From<&AppConfig> for ChatSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_context_tokens: config.max_context_tokens,
            max_commands: config.max_commands,
            stream: config.stream,
        }
    }
}

pub struct Bot {
    pub(crate) conversation: Conversation,
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) counter: Arc<dyn TokenCounter>,
    pub(crate) output: Arc<dyn OutputSink>,
    store: Option<Arc<dyn ConversationStore>>,
    pub(crate) settings: ChatSettings,
    auto_title: bool,
}

impl Bot {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            conversation: Conversation::new(),
            provider,
            counter: Arc::new(ChatMlCounter),
            output: Arc::new(StdoutSink),
            store: None,
            settings: ChatSettings::default(),
            auto_title: false,
        }
    }

    pub fn with_settings(mut self, settings: ChatSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_output(mut self, output: Arc<dyn OutputSink>) -> Self {
        self.output = output;
        self
    }

    /// Persist after every change. Enables auto-titling of untitled
    /// conversations unless turned off with [`Bot::with_auto_title`].
    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self.auto_title = true;
        self
    }

    pub fn with_auto_title(mut self, enabled: bool) -> Self {
        self.auto_title = enabled;
        self
    }

    /// Continue an existing conversation.
    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = conversation;
        self
    }

    /// A detached copy: same collaborators, a snapshot of the conversation,
    /// no store.
    pub fn fork(&self) -> Bot {
        Bot {
            conversation: self.conversation.clone(),
            provider: Arc::clone(&self.provider),
            counter: Arc::clone(&self.counter),
            output: Arc::clone(&self.output),
            store: None,
            settings: self.settings.clone(),
            auto_title: false,
        }
    }

    /// A throwaway-bot factory sharing this bot's provider and settings.
    pub fn one_shot(&self) -> OneShot {
        OneShot::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.counter),
            Arc::clone(&self.output),
            self.settings.clone(),
        )
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn output(&self) -> &Arc<dyn OutputSink> {
        &self.output
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.conversation.title = Some(title.into());
    }

    /// Append an entry and persist if any message was added.
    pub async fn append(&mut self, entry: impl Into<Entry>, role: Role) -> Result<usize, BotError> {
        let added = self.conversation.append(entry, role);
        if added > 0 {
            self.persist().await?;
        }
        Ok(added)
    }

    /// Append with system as the default role.
    pub async fn inject(&mut self, entry: impl Into<Entry>) -> Result<usize, BotError> {
        self.append(entry, Role::System).await
    }

    /// Drop the last `n` messages.
    pub async fn erase(&mut self, n: usize) -> Result<usize, BotError> {
        let erased = self.conversation.erase(n);
        if erased > 0 {
            self.persist().await?;
        }
        Ok(erased)
    }

    pub(crate) async fn persist(&mut self) -> Result<(), BotError> {
        let Some(store) = self.store.clone() else {
            return Ok(());
        };
        if self.conversation.is_empty() {
            return Ok(());
        }
        if self.auto_title && self.conversation.title.is_none() {
            debug!("Auto-titling transcript");
            let transcript = self.conversation.format_transcript_markdown(None);
            let title = Box::pin(self.one_shot().title(&transcript)).await;
            debug!(title = %title, "Auto-titled");
            self.conversation.title = Some(title);
        }
        store.save(&mut self.conversation)?;
        Ok(())
    }

    /// One model round-trip.
    ///
    /// Appends `prompt` as a user message, checks the context budget, sends
    /// the whole conversation and appends the reply. Recoverable failures
    /// come back as sentinel text.
    pub async fn chat(&mut self, prompt: Option<Entry>, stream: bool) -> Result<String, BotError> {
        if let Some(prompt) = prompt {
            self.append(prompt, Role::User).await?;
        }

        if self.conversation.is_empty() {
            if stream {
                self.output.emit_line(EMPTY_MSG);
            }
            return Ok(EMPTY_MSG.to_string());
        }

        let tokens = self
            .counter
            .count_messages(&self.conversation.messages, &self.settings.model)?;
        debug!("Counted {tokens} {} in conversation", plural("token", tokens));
        if tokens > self.settings.max_context_tokens {
            warn!(
                tokens,
                max = self.settings.max_context_tokens,
                "Conversation exceeds the context budget"
            );
            return self.sentinel(LIMIT_MSG, stream).await;
        }

        let request = ProviderRequest::new(&self.settings.model, &self.conversation.messages)
            .temperature(self.settings.temperature)
            .stream(stream);

        let outcome = if stream {
            self.stream_reply(request).await
        } else {
            self.complete_reply(request).await
        };

        let (content, finish_reason) = match outcome {
            Ok(reply) => reply,
            Err(ProviderError::AuthenticationFailed(reason)) => {
                error!(
                    "OpenAI API key authentication failed ({reason}). Run \"wigli --set-api-key <your_openai_api_key>\" to fix this."
                );
                return self.sentinel(KEY_ERR_MSG, stream).await;
            }
            Err(e) => return Err(e.into()),
        };

        if finish_reason == FinishReason::Length {
            if stream {
                self.output.emit_line(LIMIT_MSG);
            }
            let content = format!("{content}{LIMIT_MSG}");
            self.append(Message::assistant(content.clone()), Role::Assistant)
                .await?;
            return Ok(content);
        }

        if stream {
            self.output.emit("\n");
        }
        self.append(Message::assistant(content.clone()), Role::Assistant)
            .await?;

        if self.conversation.tick_reminders() > 0 {
            debug!("Reminders due");
            self.persist().await?;
        }
        Ok(content)
    }

    async fn sentinel(&mut self, text: &str, stream: bool) -> Result<String, BotError> {
        if stream {
            self.output.emit_line(text);
        }
        self.append(Message::assistant(text), Role::Assistant).await?;
        Ok(text.to_string())
    }

    async fn complete_reply(
        &self,
        request: ProviderRequest,
    ) -> Result<(String, FinishReason), ProviderError> {
        let response = self.provider.complete(request).await?;
        Ok((response.message.content, response.finish_reason))
    }

    async fn stream_reply(
        &self,
        request: ProviderRequest,
    ) -> Result<(String, FinishReason), ProviderError> {
        let mut rx = self.provider.stream(request).await?;
        let mut content = String::new();
        let mut finish_reason = FinishReason::Stop;

        while let Some(chunk) = rx.recv().await {
            let chunk = chunk?;
            if let Some(text) = chunk.content.as_deref().filter(|t| !t.is_empty()) {
                self.output.emit(text);
                content.push_str(text);
            }
            if let Some(reason) = chunk.finish_reason {
                finish_reason = reason;
            }
            if chunk.done {
                break;
            }
        }
        Ok((content, finish_reason))
    }
}
