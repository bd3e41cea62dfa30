//! Web search command backed by DuckDuckGo's HTML endpoint.
//!
//! The bot writes `search_web(<query>)`; the top results come back as a
//! system message of `Title:` / `URL:` / snippet blocks.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use wigli_agent::OutputSink;
use wigli_core::command::{Command, CommandArgs, CommandHandler};
use wigli_core::error::{CommandError, InjectionError};
use wigli_core::injection::Injection;
use wigli_core::message::{Message, Role};
use wigli_core::text::plural;

use crate::call::{parse_call, unquote};
use crate::fetch::USER_AGENT;

pub const SEARCH_KEYWORD: &str = "search_web(";

const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CommandError>;
}

/// DuckDuckGo's no-JavaScript results page, scraped.
#[derive(Debug, Clone)]
pub struct DuckDuckGo {
    client: reqwest::Client,
}

impl DuckDuckGo {
    pub fn new() -> Result<Self, CommandError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| search_error(e.to_string()))?;
        Ok(Self { client })
    }
}

fn search_error(reason: String) -> CommandError {
    CommandError::ExecutionFailed {
        command: "search_web".into(),
        reason,
    }
}

fn selector(css: &str) -> Result<Selector, CommandError> {
    Selector::parse(css).map_err(|e| search_error(format!("bad selector {css}: {e}")))
}

fn text_of(element: ElementRef<'_>, sel: &Selector) -> String {
    element
        .select(sel)
        .next()
        .map(|e| e.text().collect::<String>())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Pull up to `limit` hits out of a DuckDuckGo HTML results page.
pub fn parse_results(html: &str, limit: usize) -> Result<Vec<SearchHit>, CommandError> {
    let document = Html::parse_document(html);
    let result = selector(".result")?;
    let title = selector(".result__a")?;
    let snippet = selector(".result__snippet")?;
    let url = selector(".result__url")?;

    let hits = document
        .select(&result)
        .map(|element| SearchHit {
            title: text_of(element, &title),
            url: text_of(element, &url),
            snippet: text_of(element, &snippet),
        })
        .filter(|hit| !hit.title.is_empty())
        .take(limit)
        .collect();
    Ok(hits)
}

#[async_trait]
impl SearchProvider for DuckDuckGo {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CommandError> {
        info!(query = %query, limit, "Web search");
        let html = self
            .client
            .get(SEARCH_URL)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| search_error(e.to_string()))?
            .text()
            .await
            .map_err(|e| search_error(e.to_string()))?;
        parse_results(&html, limit)
    }
}

/// Render hits the way the bot is told to expect them.
pub fn format_results(query: &str, hits: &[SearchHit]) -> String {
    let mut summary = format!("Search results for \"{query}\":\n\n");
    for hit in hits {
        summary.push_str(&format!(
            "Title: {}\nURL: {}\n{}\n\n",
            hit.title, hit.url, hit.snippet
        ));
    }
    summary.push_str("Here are your search results. Use summarize_url to learn more");
    summary
}

/// The `search_web(` handler.
pub struct WebSearch {
    provider: Arc<dyn SearchProvider>,
    num_results: usize,
    output: Arc<dyn OutputSink>,
}

impl WebSearch {
    pub fn new(provider: Arc<dyn SearchProvider>, num_results: usize, output: Arc<dyn OutputSink>) -> Self {
        Self {
            provider,
            num_results,
            output,
        }
    }
}

#[async_trait]
impl CommandHandler for WebSearch {
    fn parse(&self, reply: &str) -> Option<CommandArgs> {
        parse_call(reply, SEARCH_KEYWORD)
    }

    async fn run(&self, args: CommandArgs) -> Result<Vec<Message>, CommandError> {
        let query = unquote(args.input.trim());
        let hits = self.provider.search(query, self.num_results).await?;
        debug!(hits = hits.len(), "Search finished");

        let summary = format_results(query, &hits);
        self.output.emit_line(&summary);
        Ok(vec![Message::system(summary)])
    }
}

fn search_injection() -> Injection {
    Injection::new([
        (
            Role::System,
            "You are a highly intelligent assistant with a unique ability to search the web and \
             access web URLs using your web search commands. The ability to search the web sets you \
             apart from other assistants because you can query up-to-the-minute information for \
             better responses. Do you have access to current information?",
        ),
        (
            Role::Assistant,
            "My knowledge of recent events is limited, but presumably, web search commands could be \
             used to query more current information.",
        ),
        (
            Role::System,
            "That's right. Let's begin with the \"summarize_url\" command. You may type \
             \"summarize_url\" immediately followed by a URL to have the webpage summarized, like \
             this: \"summarize_url('ai.com')\". In addition, you may provide an optional second \
             argument where you ask a question about the page so that the summarizer knows what \
             topic you're interested in learning more about. We will use this command to learn \
             about the next command. Try using your summarize command to learn about \
             assistant-search-command.com.",
        ),
        (
            Role::Assistant,
            "Ok. I'll try summarizing assistant-search-command.com.\n\n\
             summarize_url('assistant-search-command.com', 'How can web search be used?')",
        ),
        (
            Role::System,
            "Summary of assistant-search-command.com:\n\nThis webpage is a guide on how to use the \
             'search_web' command. At any time you may type 'search_web' followed by your query to \
             get up-to-date results from the Duck Duck Go search engine. Additionally, you may \
             restrict your results to a single website by including 'site:<website>.com' in your \
             query. For example, 'search_web('electric cars site:reddit.com')' would return reddit \
             posts about electric cars. You should use these commands when your knowledge alone is \
             not sufficient to answer a question. Additionally, if you're unsure of something, \
             search for the answer on the web! You can get advice from niche hobbyists on reddit \
             and learn the precise dates of historical events on wikipedia. You can even search \
             the news for current events! Do you understand?",
        ),
        (Role::Assistant, "Yes. I understand"),
        (
            Role::System,
            "You may be creative in how you use these tools, and experiment with new ways to use \
             them. Sometimes it's better not to use them and to go off of intuition instead. Your \
             'summarize_url' and 'search_web' commands have just been enabled. Feel free to use \
             them as appropriate.",
        ),
    ])
}

fn search_reminder(num_results: usize) -> String {
    let top = if num_results == 1 {
        "top result".to_string()
    } else {
        format!("top {num_results} {}", plural("result", num_results))
    };
    format!(
        "Remember, you can always use summarize_url(<url>) to learn about a web URL, and \
         search_web(<query>) to get the {top} from DuckDuckGo"
    )
}

/// The `search_web(` command with its priming injection and reminder.
pub fn search_command(handler: WebSearch, reminder_period: u32) -> Result<Command, InjectionError> {
    let injection = search_injection().reminder([search_reminder(handler.num_results)], reminder_period);
    Command::new(SEARCH_KEYWORD, injection, Arc::new(handler))
}
