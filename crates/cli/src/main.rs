//! wigli: chat with a language model from the terminal.
//!
//! Each invocation resumes (or starts) a conversation from the local
//! archive, optionally arms commands and personas, sends one prompt and
//! saves the result. Utility modes list, print or edit the archive instead
//! of chatting.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser, Debug)]
#[command(
    name = "wigli",
    about = "wigli: a chat bot for your terminal that can search the web, summarize pages and run Python",
    version,
    after_help = "Your chat history is saved locally, and you can use your own OpenAI API key."
)]
pub struct Cli {
    /// The prompt to submit (a file path with --fileprompt)
    #[arg(required_unless_present_any = [
        "noprompt", "transcript_full", "list", "botcommands", "set_api_key"
    ])]
    pub prompt: Option<String>,

    /// Log verbosity, cumulative up to 3
    #[arg(short, long, action = ArgAction::Count)]
    pub verbosity: u8,

    /// Save an OpenAI API key to the data directory's .env file
    #[arg(short = 'K', long, value_name = "API_KEY")]
    pub set_api_key: Option<String>,

    /// List past conversations
    #[arg(short, long)]
    pub list: bool,

    /// Force a fresh conversation
    #[arg(short, long)]
    pub clean: bool,

    /// Enable the search_web and summarize_url commands
    #[arg(short, long)]
    pub search: bool,

    /// Resume the most recent conversation
    #[arg(short, long, group = "resume")]
    pub resume_last: bool,

    /// Resume the conversation whose timestamp contains this text
    #[arg(long, group = "resume")]
    pub time: Option<String>,

    /// Resume by reverse-chronological index (1 = newest)
    #[arg(short, long, group = "resume")]
    pub index: Option<usize>,

    /// Resume the conversation whose title contains this text
    #[arg(long, group = "resume")]
    pub title: Option<String>,

    /// Print the full transcript instead of chatting
    #[arg(short = 'T', long)]
    pub transcript_full: bool,

    /// System prompt placed before the user prompt
    #[arg(long)]
    pub system: Option<String>,

    /// Complete the next reply from the history alone
    #[arg(short = 'm', long)]
    pub noprompt: bool,

    /// Parse the last message for bot commands and reprompt with their output
    #[arg(short, long, conflicts_with = "usercommands")]
    pub botcommands: bool,

    /// Parse the prompt for commands and run them without chatting
    #[arg(short, long)]
    pub usercommands: bool,

    /// Erase this many messages from the end of the conversation
    #[arg(short, long, value_name = "N")]
    pub erase: Option<usize>,

    /// Enable the Python interpreter command
    #[arg(short = 'x', long)]
    pub python: bool,

    /// Summon the history professor
    #[arg(short = 'P', long)]
    pub professor: bool,

    /// Read the prompt from the file named by PROMPT
    #[arg(short, long)]
    pub fileprompt: bool,

    /// Treat the prompt as a Python function for the headless doctest bot
    #[arg(long)]
    pub doctest: bool,

    /// Where conversations, transcripts and logs live
    #[arg(long, env = wigli_config::DATA_DIR_ENV)]
    pub data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let started = chrono::Utc::now();

    let data_dir = wigli_config::resolve_data_dir(cli.data_dir.clone());
    let archive = wigli_store::ChatArchive::open(&data_dir)
        .map_err(|e| format!("Failed to open data directory {}: {e}", data_dir.display()))?;

    logging::init(cli.verbosity, &archive.log_path(started))?;
    tracing::debug!(args = ?cli, "Parsed arguments");

    commands::run(cli, archive, started).await
}
