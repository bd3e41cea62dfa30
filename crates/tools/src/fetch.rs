//! Fetching web pages as plain text.

use async_trait::async_trait;
use scraper::{Html, Node};
use std::time::Duration;
use tracing::debug;
use wigli_core::error::CommandError;

/// Browser-like user agent; some sites refuse the default one.
pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Readable text of the page at `url`.
    async fn fetch_text(&self, url: &str) -> Result<String, CommandError>;
}

/// Fetches over HTTP with `reqwest` and strips the markup.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, CommandError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| fetch_error(e.to_string()))?;
        Ok(Self { client })
    }
}

fn fetch_error(reason: String) -> CommandError {
    CommandError::ExecutionFailed {
        command: "fetch_page".into(),
        reason,
    }
}

/// Bare hosts like `example.com` are fetched over https.
pub(crate) fn with_scheme(url: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, CommandError> {
        let url = with_scheme(url);
        debug!(url = %url, "Fetching page");
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?
            .text()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        Ok(html_to_text(&body))
    }
}

/// Visible text of an HTML document, one text run per line.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_and_hidden_elements() {
        let html = r#"<html><head><title>T</title><style>p { color: red }</style></head>
            <body><h1>Ducks</h1><script>var x = 1;</script>
            <p>Diving ducks <b>dive</b>.</p></body></html>"#;
        let text = html_to_text(html);
        assert_eq!(text, "Ducks\nDiving ducks\ndive\n.");
    }

    #[test]
    fn bare_hosts_get_https() {
        assert_eq!(with_scheme("ai.com"), "https://ai.com");
        assert_eq!(with_scheme("http://ai.com/x"), "http://ai.com/x");
    }
}
