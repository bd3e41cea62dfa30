//! Chat archive for wigli.
//!
//! Conversations are kept as JSON under `conversations/`, rendered markdown
//! transcripts under `transcripts/`, and per-invocation event logs under
//! `logs/`, all beneath one data directory.

pub mod archive;
pub mod selector;

pub use archive::{ArchiveEntry, ChatArchive};
pub use selector::Selector;
