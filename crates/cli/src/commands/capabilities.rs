//! Arming personas and commands from flags.

use std::sync::Arc;
use wigli_agent::Bot;
use wigli_config::AppConfig;
use wigli_core::message::Message;
use wigli_store::ChatArchive;
use wigli_tools::{
    DuckDuckGo, HttpFetcher, PythonRunner, Summarizer, TerminalConfirm, WebSearch,
    history_professor, python_command, search_command, summarize_command,
};

use crate::Cli;

/// Apply the `--system` prompt, then `--professor`, `--python` and
/// `--search`. Re-arming a command on a resumed conversation only rebinds its
/// handler.
pub async fn arm(
    bot: &mut Bot,
    cli: &Cli,
    config: &AppConfig,
    archive: &ChatArchive,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(system) = &cli.system {
        bot.inject(Message::system(system.clone())).await?;
    }

    if cli.professor {
        println!("Summoning Professor Wigli");
        bot.inject(history_professor(config.reminder_period)).await?;
    }

    if cli.python {
        println!("Injecting Python capabilities");
        let runner = PythonRunner::new(
            archive.scripts_dir(),
            &config.python,
            Arc::new(TerminalConfirm),
            Arc::clone(bot.output()),
        );
        bot.inject(python_command(runner)?).await?;
    }

    if cli.search {
        println!("Injecting web search capabilities");
        let search = WebSearch::new(
            Arc::new(DuckDuckGo::new()?),
            config.search.num_results,
            Arc::clone(bot.output()),
        );
        bot.inject(search_command(search, config.reminder_period)?).await?;

        let summarizer = Summarizer::new(
            Arc::new(HttpFetcher::new()?),
            bot.one_shot(),
            Arc::clone(bot.output()),
        );
        bot.inject(summarize_command(summarizer)?).await?;
    }

    Ok(())
}
