//! URL summarization command.
//!
//! `summarize_url(<url> [question])` fetches the page, trims its text until
//! the prompt fits the context budget, and has a one-shot bot summarize it.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wigli_agent::{CHARS_PER_TOKEN, OneShot, OutputSink};
use wigli_core::command::{Command, CommandArgs, CommandHandler};
use wigli_core::error::{CommandError, InjectionError};
use wigli_core::injection::Injection;
use wigli_core::message::{Message, MessageInput, Role, normalize};

use crate::call::{parse_call, unquote};
use crate::fetch::PageFetcher;

pub const SUMMARIZE_KEYWORD: &str = "summarize_url(";

/// Page text used when the page cannot be fetched.
pub const FETCH_FAILED_TEXT: &str = "Error parsing URL\n";

/// Share of the context budget the summarization prompt may use.
const BUDGET_SHARE: f64 = 0.8;

pub struct Summarizer {
    fetcher: Arc<dyn PageFetcher>,
    one_shot: OneShot,
    output: Arc<dyn OutputSink>,
}

impl Summarizer {
    pub fn new(fetcher: Arc<dyn PageFetcher>, one_shot: OneShot, output: Arc<dyn OutputSink>) -> Self {
        Self {
            fetcher,
            one_shot,
            output,
        }
    }

    fn count(&self, prompt: &[MessageInput]) -> Result<usize, CommandError> {
        let messages = normalize(prompt.iter().cloned(), Role::System);
        self.one_shot
            .counter()
            .count_messages(&messages, &self.one_shot.settings().model)
            .map_err(|e| CommandError::Nested(e.to_string()))
    }

    /// Drop text from the end of the page until the prompt fits.
    fn fit(&self, mut page: String, question: &str) -> Result<Vec<MessageInput>, CommandError> {
        let budget = (self.one_shot.settings().max_context_tokens as f64 * BUDGET_SHARE).round();
        let mut prompt = summary_prompt(&page, question);
        let mut tokens = self.count(&prompt)?;

        while tokens as f64 > budget && !page.is_empty() {
            let excess = tokens as f64 - budget * 0.99;
            let chop = (0.6 * excess / CHARS_PER_TOKEN as f64).round() as usize;
            if chop == 0 {
                break;
            }
            let keep = page.chars().count().saturating_sub(chop);
            page = page.chars().take(keep).collect();
            prompt = summary_prompt(&page, question);
            tokens = self.count(&prompt)?;
        }
        debug!(tokens, budget, "Summarization prompt sized");
        Ok(prompt)
    }
}

/// Split the argument into (url, question).
fn split_argument(input: &str) -> (String, String) {
    let input = input.trim();
    let url = input.split_whitespace().next().unwrap_or_default();
    let question = unquote(input[url.len()..].replace(',', "").trim()).to_string();
    let url = unquote(url.replace(',', "").trim()).to_string();
    (url, question)
}

fn summary_prompt(page: &str, question: &str) -> Vec<MessageInput> {
    let focus = if question.is_empty() {
        ""
    } else {
        "In addition, you accept a brief question along with the webpage, which you always \
         address in your summary, even if means reading the page's text more closely to find the \
         relevant information. "
    };
    let request = if question.is_empty() {
        String::new()
    } else {
        format!("When summarizing this page, please focus on the following subject: {question}\n\n")
    };
    vec![
        MessageInput::from((
            Role::System,
            format!(
                "You are an expert at summarizing webpages and articles. You've studied every page \
                 on the internet, you have an intimate understanding of webpage layouts, and you \
                 have an unparalleled ability to skim a page and relay the important parts while \
                 discarding the garbage. {focus}HTML is too messy. You prefer your websites \
                 converted to plain English. You're eager to summarize another webpage but you are \
                 actively tempering your eagerness with critical thought. This is an important job. \
                 Luckily you possess a broad knowledge of all subjects. Your summary will be around \
                 2 to 5 paragraphs long. The next message will contain the text of your webpage to \
                 analyze and summarize. Are you ready?"
            ),
        )),
        MessageInput::from((Role::Assistant, "Yes! I am ready.")),
        MessageInput::from((
            Role::User,
            format!("{request}Here is the text of the page to summarize:\n\n{page}"),
        )),
    ]
}

#[async_trait]
impl CommandHandler for Summarizer {
    fn parse(&self, reply: &str) -> Option<CommandArgs> {
        parse_call(reply, SUMMARIZE_KEYWORD)
    }

    async fn run(&self, args: CommandArgs) -> Result<Vec<Message>, CommandError> {
        let (url, question) = split_argument(&args.input);
        info!(url = %url, question = %question, "Summarizing page");

        let page = match self.fetcher.fetch_text(&url).await {
            Ok(text) => text,
            Err(e) => {
                warn!(url = %url, "Page fetch failed: {e}");
                FETCH_FAILED_TEXT.to_string()
            }
        };

        let prompt = self.fit(page, &question)?;
        if args.stream {
            self.output.emit(&format!("Summary of {url}:\n\n"));
        }
        let summary = self
            .one_shot
            .run(prompt, args.stream)
            .await
            .map_err(|e| CommandError::Nested(e.to_string()))?;

        Ok(vec![Message::system(format!(
            "Summary of {url}:\n\n{}\n",
            summary.trim()
        ))])
    }
}

/// The `summarize_url(` command. It carries no injection of its own; the
/// search injection introduces it.
pub fn summarize_command(handler: Summarizer) -> Result<Command, InjectionError> {
    Command::new(
        SUMMARIZE_KEYWORD,
        Injection::new(Vec::<MessageInput>::new()),
        Arc::new(handler),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixedFetcher, ScriptedProvider, one_shot};
    use wigli_agent::BufferSink;
    use wigli_core::error::ProviderError;

    #[test]
    fn argument_splits_url_and_question() {
        assert_eq!(
            split_argument("'ai.com', 'What is it?'"),
            ("ai.com".to_string(), "What is it?".to_string())
        );
        assert_eq!(
            split_argument("example.com"),
            ("example.com".to_string(), String::new())
        );
    }

    #[test]
    fn prompt_mentions_question_only_when_given() {
        let with = summary_prompt("page", "ducks?");
        let without = summary_prompt("page", "");
        let text = |p: &[MessageInput]| format!("{p:?}");
        assert!(text(&with).contains("focus on the following subject: ducks?"));
        assert!(!text(&without).contains("focus on"));
        assert_eq!(with.len(), 3);
    }

    #[tokio::test]
    async fn summarizes_fetched_page() {
        let provider = Arc::new(ScriptedProvider::new(["  Ducks dive.  "]));
        let handler = Summarizer::new(
            Arc::new(FixedFetcher::ok("Diving ducks are ducks that dive.")),
            one_shot(provider.clone(), 4096),
            Arc::new(BufferSink::new()),
        );
        let args = handler.parse("summarize_url('ducks.example', 'why dive?')").unwrap();
        let out = handler.run(args).await.unwrap();

        assert_eq!(out[0].role, Role::System);
        assert_eq!(out[0].content, "Summary of ducks.example:\n\nDucks dive.\n");
        let request = provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 3);
        assert!(request.messages[2].content.contains("Diving ducks are ducks that dive."));
        assert!(request.messages[2].content.contains("why dive?"));
    }

    #[tokio::test]
    async fn fetch_failure_is_summarized_as_error_text() {
        let provider = Arc::new(ScriptedProvider::new(["The page could not be read."]));
        let handler = Summarizer::new(
            Arc::new(FixedFetcher::failing()),
            one_shot(provider.clone(), 4096),
            Arc::new(BufferSink::new()),
        );
        handler.run(CommandArgs::new("nowhere.example")).await.unwrap();
        let request = provider.last_request().unwrap();
        assert!(request.messages[2].content.ends_with(FETCH_FAILED_TEXT));
    }

    #[tokio::test]
    async fn long_pages_are_trimmed_to_budget() {
        let provider = Arc::new(ScriptedProvider::new(["Short."]));
        let handler = Summarizer::new(
            Arc::new(FixedFetcher::ok(&"word ".repeat(5_000))),
            one_shot(provider.clone(), 1000),
            Arc::new(BufferSink::new()),
        );
        handler.run(CommandArgs::new("big.example")).await.unwrap();

        let request = provider.last_request().unwrap();
        let sent = handler.count(
            &request
                .messages
                .iter()
                .cloned()
                .map(MessageInput::from)
                .collect::<Vec<_>>(),
        );
        assert!(sent.unwrap() <= 800);
        assert!(request.messages[2].content.len() < 5_000);
    }

    #[tokio::test]
    async fn streaming_prints_header() {
        let provider = Arc::new(ScriptedProvider::new(["Fine."]));
        let sink = Arc::new(BufferSink::new());
        let handler = Summarizer::new(
            Arc::new(FixedFetcher::ok("text")),
            one_shot(provider, 4096),
            sink.clone(),
        );
        let mut args = CommandArgs::new("a.example");
        args.stream = true;
        handler.run(args).await.unwrap();
        assert!(sink.contents().starts_with("Summary of a.example:\n\n"));
    }

    #[tokio::test]
    async fn provider_failure_is_nested_error() {
        let provider = Arc::new(ScriptedProvider::failing(ProviderError::Network("down".into())));
        let handler = Summarizer::new(
            Arc::new(FixedFetcher::ok("text")),
            one_shot(provider, 4096),
            Arc::new(BufferSink::new()),
        );
        let err = handler.run(CommandArgs::new("a.example")).await.unwrap_err();
        assert!(matches!(err, CommandError::Nested(_)));
    }
}
