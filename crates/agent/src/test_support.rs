//! Scripted collaborators for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use wigli_core::conversation::Conversation;
use wigli_core::error::{ProviderError, StoreError};
use wigli_core::message::Message;
use wigli_core::provider::{
    ChunkReceiver, FinishReason, Provider, ProviderRequest, ProviderResponse, StreamChunk,
};
use wigli_core::store::ConversationStore;

enum Step {
    Reply(String, FinishReason),
    Fail(ProviderError),
    Chunks(Vec<Result<StreamChunk, ProviderError>>),
}

impl Step {
    fn replay(&self) -> Self {
        match self {
            Step::Reply(text, reason) => Step::Reply(text.clone(), *reason),
            Step::Fail(e) => Step::Fail(e.clone()),
            Step::Chunks(chunks) => Step::Chunks(chunks.clone()),
        }
    }
}

/// Replies from a script. The final step repeats forever.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn from_steps(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_steps(
            replies
                .into_iter()
                .map(|r| Step::Reply(r.into(), FinishReason::Stop))
                .collect(),
        )
    }

    pub fn truncated(partial: &str) -> Self {
        Self::from_steps(vec![Step::Reply(partial.into(), FinishReason::Length)])
    }

    pub fn failing(err: ProviderError) -> Self {
        Self::from_steps(vec![Step::Fail(err)])
    }

    /// Streams `chunks` one by one, in order. `complete` joins their text.
    pub fn chunked(chunks: Vec<Result<StreamChunk, ProviderError>>) -> Self {
        Self::from_steps(vec![Step::Chunks(chunks)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
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
        match self.next_step(request) {
            Some(Step::Reply(text, finish_reason)) => Ok(ProviderResponse {
                message: Message::assistant(text),
                finish_reason,
                usage: None,
                model,
            }),
            Some(Step::Chunks(chunks)) => {
                let mut text = String::new();
                let mut finish_reason = FinishReason::Stop;
                for chunk in chunks {
                    let chunk = chunk?;
                    text.push_str(chunk.content.as_deref().unwrap_or_default());
                    if let Some(reason) = chunk.finish_reason {
                        finish_reason = reason;
                    }
                }
                Ok(ProviderResponse {
                    message: Message::assistant(text),
                    finish_reason,
                    usage: None,
                    model,
                })
            }
            Some(Step::Fail(e)) => Err(e),
            None => Err(ProviderError::NotConfigured("empty script".into())),
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let chunks = match self.next_step(request) {
            Some(Step::Chunks(chunks)) => chunks,
            Some(Step::Reply(text, finish_reason)) => vec![Ok(StreamChunk {
                content: Some(text),
                finish_reason: Some(finish_reason),
                done: true,
            })],
            Some(Step::Fail(e)) => return Err(e),
            None => return Err(ProviderError::NotConfigured("empty script".into())),
        };

        let (tx, rx) = tokio::sync::mpsc::channel(1);
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(chunk).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

impl ScriptedProvider {
    fn next_step(&self, request: ProviderRequest) -> Option<Step> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        let mut steps = self.steps.lock().unwrap();
        if steps.len() > 1 {
            steps.pop_front()
        } else {
            steps.front().map(Step::replay)
        }
    }
}

/// Keeps every saved snapshot.
#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Vec<Conversation>>,
}

impl MemoryStore {
    pub fn saves(&self) -> usize {
        self.saved.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Conversation> {
        self.saved.lock().unwrap().last().cloned()
    }
}

impl ConversationStore for MemoryStore {
    fn save(&self, conversation: &mut Conversation) -> Result<(), StoreError> {
        conversation.touch();
        self.saved.lock().unwrap().push(conversation.clone());
        Ok(())
    }
}
