//! Scripted collaborators for command tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use wigli_agent::{BufferSink, ChatMlCounter, ChatSettings, OneShot};
use wigli_core::error::{CommandError, ProviderError};
use wigli_core::message::Message;
use wigli_core::provider::{FinishReason, Provider, ProviderRequest, ProviderResponse};

use crate::fetch::PageFetcher;

/// Replies from a script; the final reply repeats forever.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: ProviderError) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(err)])),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap()
        };
        reply.map(|text| ProviderResponse {
            message: Message::assistant(text),
            finish_reason: FinishReason::Stop,
            usage: None,
            model,
        })
    }
}

pub fn one_shot(provider: Arc<ScriptedProvider>, max_context_tokens: usize) -> OneShot {
    OneShot::new(
        provider,
        Arc::new(ChatMlCounter),
        Arc::new(BufferSink::new()),
        ChatSettings {
            max_context_tokens,
            ..ChatSettings::default()
        },
    )
}

/// Returns the same page text for every URL, or always fails.
pub struct FixedFetcher(Option<String>);

impl FixedFetcher {
    pub fn ok(text: &str) -> Self {
        Self(Some(text.to_string()))
    }

    pub fn failing() -> Self {
        Self(None)
    }
}

#[async_trait]
impl PageFetcher for FixedFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, CommandError> {
        self.0.clone().ok_or_else(|| CommandError::ExecutionFailed {
            command: "fetch_page".into(),
            reason: format!("unreachable: {url}"),
        })
    }
}
