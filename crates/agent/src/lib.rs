//! The wigli bot: the base send path and the command loop around it.
//!
//! 1. **Append** the prompt as a user message
//! 2. **Budget** the context with a token counter
//! 3. **Send** the conversation to the provider, streamed or collected
//! 4. **Scan** the reply for an active command keyword
//! 5. **Run** the command, append its output, and re-query the model
//!
//! The loop ends when no command triggers, a handler quits, reprompting is
//! off, or the cycle cap is hit.

pub mod bot;
pub mod error;
pub mod loop_runner;
pub mod oneshot;
pub mod output;
pub mod token;

#[cfg(test)]
mod test_support;

pub use bot::{Bot, ChatSettings, EMPTY_MSG, KEY_ERR_MSG, LIMIT_MSG, TIMEOUT_MSG, TIMEOUT_SECS};
pub use error::BotError;
pub use loop_runner::{SendOptions, cap_warning};
pub use oneshot::{FALLBACK_TITLE, OneShot};
pub use output::{BufferSink, OutputSink, StdoutSink};
pub use token::{CHARS_PER_TOKEN, ChatMlCounter, TokenCounter, estimate_tokens};
