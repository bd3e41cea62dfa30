//! The invocation flow.
//!
//! Utility modes run first and exit early: set-api-key and list. Then the
//! conversation is resumed (or started) and optionally erased, the
//! transcript mode exits, capabilities are armed, and exactly one of
//! botcommands, doctest, usercommands or a normal send runs.

pub mod capabilities;
pub mod history;
pub mod session;
pub mod setup;

use chrono::{DateTime, Utc};
use tracing::info;
use wigli_agent::SendOptions;
use wigli_config::AppConfig;
use wigli_core::conversation::Entry;
use wigli_store::ChatArchive;

use crate::Cli;

pub async fn run(
    cli: Cli,
    archive: ChatArchive,
    started: DateTime<Utc>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(key) = &cli.set_api_key {
        return setup::set_api_key(archive.data_dir(), key);
    }

    if cli.list {
        return history::list(&archive);
    }

    let config = AppConfig::load(archive.data_dir())
        .map_err(|e| format!("Failed to load config: {e}"))?;

    let resumed = if cli.clean {
        None
    } else {
        session::resume(&cli, &archive, &config, started)?
    };

    let was_resumed = resumed.is_some();
    let mut bot = session::build_bot(&config, &archive, resumed)?;
    if let Some(n) = cli.erase.filter(|_| was_resumed) {
        let erased = bot.erase(n).await?;
        info!("Erased {erased} {}", wigli_core::text::plural("message", erased));
    }

    if cli.transcript_full {
        history::print_transcript(was_resumed.then(|| bot.conversation()));
        return Ok(());
    }

    capabilities::arm(&mut bot, &cli, &config, &archive).await?;

    if cli.botcommands {
        info!("Parsing last message for commands, then reprompting with output");
        bot.send(None, SendOptions::nochat()).await?;
        return Ok(());
    }

    let prompt = match (&cli.prompt, cli.fileprompt) {
        (Some(path), true) => {
            info!(path = %path, "Reading text prompt from file");
            Some(std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read prompt file {path}: {e}"))?)
        }
        (prompt, _) => prompt.clone(),
    };

    if cli.doctest {
        let code = prompt.unwrap_or_default();
        info!("Invoking the headless doctest bot");
        let stream = bot.settings().stream;
        let reply = wigli_tools::doctest(&bot.one_shot(), &code, stream).await?;
        if !stream {
            println!("{reply}");
        }
        return Ok(());
    }

    let prompt = if cli.noprompt { None } else { prompt.map(Entry::from) };

    if cli.usercommands {
        info!("Parsing prompt for commands, then exiting");
        bot.send(prompt, SendOptions::nochat().reprompt(false)).await?;
        return Ok(());
    }

    info!("Starting chat");
    let stream = bot.settings().stream;
    let reply = bot.send(prompt, SendOptions::default()).await?;
    if !stream {
        println!("{reply}");
    }
    Ok(())
}
