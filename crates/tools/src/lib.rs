//! Built-in commands and personas for wigli.
//!
//! Commands give the bot the ability to act on its own replies:
//! run Python snippets, search the web and summarize pages.
//! Personas are plain injections that shape how the bot talks.

pub mod call;
pub mod confirm;
pub mod fetch;
pub mod personas;
pub mod python;
pub mod summarize_url;
pub mod web_search;

#[cfg(test)]
mod test_support;

pub use confirm::{Confirm, Decision, ScriptedConfirm, TerminalConfirm};
pub use fetch::{HttpFetcher, PageFetcher, html_to_text};
pub use personas::{doctest, history_professor};
pub use python::{PYTHON_KEYWORD, PythonRunner, python_command};
pub use summarize_url::{SUMMARIZE_KEYWORD, Summarizer, summarize_command};
pub use web_search::{DuckDuckGo, SEARCH_KEYWORD, SearchHit, SearchProvider, WebSearch, search_command};
