use thiserror::Error;
use wigli_core::error::{CommandError, ProviderError, StoreError, TokenizerError};

/// Hard failures of a send. Recoverable conditions come back as sentinel
/// replies instead.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),
}

impl From<BotError> for wigli_core::Error {
    fn from(err: BotError) -> Self {
        match err {
            BotError::Provider(e) => wigli_core::Error::Provider(e),
            BotError::Command(e) => wigli_core::Error::Command(e),
            BotError::Store(e) => wigli_core::Error::Store(e),
            BotError::Tokenizer(e) => wigli_core::Error::Tokenizer(e),
        }
    }
}
