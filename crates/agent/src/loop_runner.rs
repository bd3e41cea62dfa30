//! The command loop wrapped around [`Bot::chat`].
//!
//! After a reply arrives the loop looks for an active command whose keyword
//! appears in it, runs that command, appends the output and re-queries the
//! model, until no command triggers, a handler answers with a quit message,
//! reprompting is off, or the cycle cap is reached.

use tracing::{debug, info};
use wigli_core::conversation::Entry;
use wigli_core::message::Role;
use wigli_core::text::plural;

use crate::bot::Bot;
use crate::error::BotError;

/// Per-send switches.
#[derive(Debug, Clone, Copy)]
pub struct SendOptions {
    /// Scan the latest stored message instead of calling the model
    pub nochat: bool,
    /// Re-query the model after a command runs
    pub reprompt: bool,
    /// Override the bot's default response mode
    pub stream: Option<bool>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            nochat: false,
            reprompt: true,
            stream: None,
        }
    }
}

impl SendOptions {
    pub fn nochat() -> Self {
        Self {
            nochat: true,
            ..Self::default()
        }
    }

    pub fn reprompt(mut self, reprompt: bool) -> Self {
        self.reprompt = reprompt;
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }
}

/// Text printed when the cycle cap stops a still-triggering reply.
pub fn cap_warning(max_commands: usize) -> String {
    format!(
        "The maximum allowed number of bot commands in a row is {max_commands}, \
         but wigli would like to keep going. To allow {max_commands} more bot {}, \
         use the -b flag.",
        plural("command", max_commands)
    )
}

impl Bot {
    /// Send a prompt and drive any commands the replies trigger.
    ///
    /// Returns the content of the conversation's final message. Parser and
    /// runner errors propagate.
    pub async fn send(&mut self, prompt: Option<Entry>, options: SendOptions) -> Result<String, BotError> {
        let stream = options.stream.unwrap_or(self.settings.stream);

        let mut reply = if options.nochat {
            if let Some(prompt) = prompt {
                self.append(prompt, Role::User).await?;
            }
            if self.conversation.is_empty() {
                return Ok(String::new());
            }
            self.conversation.last_message_content().to_string()
        } else {
            self.chat(prompt, stream).await?
        };

        let max_commands = self.settings.max_commands;
        let mut cycles = 0;

        loop {
            debug!("Parsing message for commands");
            let Some(command) = self.conversation.triggered_command(&reply).cloned() else {
                break;
            };

            if cycles >= max_commands {
                self.output.emit_line(&cap_warning(max_commands));
                break;
            }

            let Some(mut args) = command.parse(&reply) else {
                debug!(keyword = command.keyword(), "Keyword present but nothing to parse");
                break;
            };
            args.stream = stream;
            cycles += 1;

            info!(keyword = command.keyword(), cycle = cycles, "Running command");
            let output = command.run(args).await?;

            if output.last().is_some_and(|m| m.role == Role::Quit) {
                info!(keyword = command.keyword(), "Command loop aborted by handler");
                break;
            }

            self.append(output, Role::System).await?;

            if !options.reprompt {
                break;
            }

            debug!("Reprompting with command output");
            reply = self.chat(None, stream).await?;
        }

        if self.conversation.is_empty() {
            Ok(reply)
        } else {
            Ok(self.conversation.last_message_content().to_string())
        }
    }
}
