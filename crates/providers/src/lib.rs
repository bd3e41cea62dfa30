//! Chat-completion providers for wigli.
//!
//! All providers implement the `wigli_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
