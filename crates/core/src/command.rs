//! Commands — keyword-triggered injections.
//!
//! A command primes the conversation like any [`Injection`] and additionally
//! watches assistant replies for a literal keyword. When the keyword shows up
//! the handler's `parse` extracts arguments from the reply and `run` performs
//! the action, producing messages that are fed back into the conversation.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::{CommandError, InjectionError};
use crate::injection::Injection;
use crate::message::Message;

/// Arguments extracted from a reply by a command's parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    /// The raw argument text pulled out of the reply
    pub input: String,

    /// Whether the conversation is currently streaming its output
    pub stream: bool,
}

impl CommandArgs {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            stream: false,
        }
    }
}

/// The two callbacks behind a command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Extract arguments from a reply that contains the keyword, or `None`
    /// when the reply does not actually hold a usable invocation.
    fn parse(&self, reply: &str) -> Option<CommandArgs>;

    /// Execute the action. A trailing [`Role::Quit`](crate::message::Role::Quit)
    /// message aborts the command loop.
    async fn run(&self, args: CommandArgs) -> Result<Vec<Message>, CommandError>;
}

type ParseFn = dyn Fn(&str) -> Option<CommandArgs> + Send + Sync;
type RunFn = dyn Fn(CommandArgs) -> Result<Vec<Message>, CommandError> + Send + Sync;

/// A handler assembled from two plain closures.
pub struct FnHandler {
    parse: Box<ParseFn>,
    run: Box<RunFn>,
}

impl FnHandler {
    pub fn new<P, R>(parse: P, run: R) -> Self
    where
        P: Fn(&str) -> Option<CommandArgs> + Send + Sync + 'static,
        R: Fn(CommandArgs) -> Result<Vec<Message>, CommandError> + Send + Sync + 'static,
    {
        Self {
            parse: Box::new(parse),
            run: Box::new(run),
        }
    }
}

#[async_trait]
impl CommandHandler for FnHandler {
    fn parse(&self, reply: &str) -> Option<CommandArgs> {
        (self.parse)(reply)
    }

    async fn run(&self, args: CommandArgs) -> Result<Vec<Message>, CommandError> {
        (self.run)(args)
    }
}

#[derive(Clone)]
pub struct Command {
    keyword: String,
    injection: Injection,
    handler: Arc<dyn CommandHandler>,
}

impl Command {
    /// Build a command. The keyword is matched literally and must not be empty.
    pub fn new(
        keyword: impl Into<String>,
        injection: Injection,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<Self, InjectionError> {
        let keyword = keyword.into();
        if keyword.is_empty() {
            return Err(InjectionError::EmptyKeyword);
        }
        Ok(Self {
            keyword,
            injection,
            handler,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn injection(&self) -> &Injection {
        &self.injection
    }

    pub fn handler(&self) -> &Arc<dyn CommandHandler> {
        &self.handler
    }

    /// Registry identity: keyword plus the injection's rendered text.
    pub fn key(&self) -> String {
        format!("{}\n{}", self.keyword, self.injection.key())
    }

    /// Does `text` contain this command's keyword?
    pub fn is_triggered_by(&self, text: &str) -> bool {
        text.contains(&self.keyword)
    }

    /// Byte offset of the first keyword occurrence in `text`.
    pub fn position_in(&self, text: &str) -> Option<usize> {
        text.find(&self.keyword)
    }

    pub fn parse(&self, reply: &str) -> Option<CommandArgs> {
        self.handler.parse(reply)
    }

    pub async fn run(&self, args: CommandArgs) -> Result<Vec<Message>, CommandError> {
        self.handler.run(args).await
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("keyword", &self.keyword)
            .field("injection_messages", &self.injection.injection_messages.len())
            .field("reminders", &self.injection.has_reminders())
            .finish()
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
