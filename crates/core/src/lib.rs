//! # wigli core
//!
//! Domain types, traits, and error definitions for the wigli conversational
//! toolkit. Backends, storage and concrete commands live in their own crates
//! and implement the traits defined here.

pub mod command;
pub mod conversation;
pub mod error;
pub mod injection;
pub mod message;
pub mod provider;
pub mod store;
pub mod text;
pub mod time;

// Re-export key types at crate root for ergonomics
pub use command::{Command, CommandArgs, CommandHandler, FnHandler};
pub use conversation::{Conversation, Entry, Transcript, TranscriptEntry, parse_markdown_transcript};
pub use error::{CommandError, Error, InjectionError, ProviderError, Result, StoreError, TokenizerError};
pub use injection::{DEFAULT_REMINDER_PERIOD, Injection};
pub use message::{Message, MessageInput, Role, normalize};
pub use provider::{ChunkReceiver, FinishReason, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
pub use store::ConversationStore;
