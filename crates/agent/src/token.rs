//! Token counting.
//!
//! Uses a character-based heuristic: ~4 characters per token, which tracks
//! BPE tokenizers closely enough on English text to budget a context window.

use wigli_core::error::TokenizerError;
use wigli_core::message::Message;

/// Characters per token assumed by the heuristic.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Counts the tokens a message list will cost for a given model.
pub trait TokenCounter: Send + Sync {
    fn count_messages(&self, messages: &[Message], model: &str) -> Result<usize, TokenizerError>;

    fn count_text(&self, text: &str, model: &str) -> Result<usize, TokenizerError>;
}

/// ChatML framing rules used by the gpt-3.5-turbo and gpt-4 families.
///
/// Every message costs 4 framing tokens plus its encoded role and content;
/// each reply is primed with 2 more.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatMlCounter;

impl ChatMlCounter {
    const PER_MESSAGE: usize = 4;
    const REPLY_PRIMING: usize = 2;

    fn supports(model: &str) -> bool {
        model.starts_with("gpt-3.5-turbo") || model.starts_with("gpt-4")
    }

    fn check(model: &str) -> Result<(), TokenizerError> {
        if Self::supports(model) {
            Ok(())
        } else {
            Err(TokenizerError::UnsupportedModel(model.to_string()))
        }
    }
}

impl TokenCounter for ChatMlCounter {
    fn count_messages(&self, messages: &[Message], model: &str) -> Result<usize, TokenizerError> {
        Self::check(model)?;
        let body: usize = messages
            .iter()
            .map(|m| {
                Self::PER_MESSAGE + estimate_tokens(m.role.as_str()) + estimate_tokens(&m.content)
            })
            .sum();
        Ok(body + Self::REPLY_PRIMING)
    }

    fn count_text(&self, text: &str, model: &str) -> Result<usize, TokenizerError> {
        Self::check(model)?;
        Ok(estimate_tokens(text))
    }
}
