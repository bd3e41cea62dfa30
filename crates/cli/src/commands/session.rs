//! Finding the conversation to continue and building the bot around it.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use wigli_agent::{Bot, ChatSettings, StdoutSink};
use wigli_config::AppConfig;
use wigli_core::conversation::Conversation;
use wigli_providers::OpenAiCompatProvider;
use wigli_store::{ChatArchive, Selector};

use crate::Cli;

/// Lookup rules in priority order: explicit resume flags, then the idle
/// window.
pub fn selectors(cli: &Cli, config: &AppConfig) -> Vec<Selector> {
    let mut selectors = Vec::new();
    if cli.resume_last {
        selectors.push(Selector::Latest);
    }
    if let Some(index) = cli.index {
        selectors.push(Selector::Index(index));
    }
    if let Some(time) = &cli.time {
        selectors.push(Selector::Timestamp(time.clone()));
    }
    if let Some(title) = &cli.title {
        selectors.push(Selector::Title(title.clone()));
    }
    selectors.push(Selector::Idle {
        window_secs: config.idle_resume_secs,
    });
    selectors
}

pub fn resume(
    cli: &Cli,
    archive: &ChatArchive,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> Result<Option<Conversation>, Box<dyn std::error::Error>> {
    let found = archive.find(&selectors(cli, config), now)?;
    match &found {
        Some(conversation) => info!(
            "Loaded previous chat: {}",
            conversation.title.as_deref().unwrap_or("No title")
        ),
        None => debug!("No previous chat to load, starting a new one"),
    }
    Ok(found)
}

pub fn build_bot(
    config: &AppConfig,
    archive: &ChatArchive,
    conversation: Option<Conversation>,
) -> Result<Bot, Box<dyn std::error::Error>> {
    if !config.has_api_key() {
        debug!("No API key configured; requests will report the missing key");
    }
    let provider = OpenAiCompatProvider::from_credentials(&config.credentials())?;

    let mut bot = Bot::new(Arc::new(provider))
        .with_settings(ChatSettings::from(config))
        .with_output(Arc::new(StdoutSink))
        .with_store(Arc::new(archive.clone()));
    if let Some(conversation) = conversation {
        bot = bot.with_conversation(conversation);
    }
    Ok(bot)
}
