//! Error types for the wigli domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all wigli operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Injection / message construction errors ---
    #[error("Injection error: {0}")]
    Injection(#[from] InjectionError),

    // --- Command errors ---
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    // --- Persistence errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Token counting ---
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Malformed message, injection or command construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectionError {
    #[error("Unknown role: {0}")]
    InvalidRole(String),

    #[error("Unsupported message shape: {0}")]
    InvalidShape(String),

    #[error("Command keyword must not be empty")]
    EmptyKeyword,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Command execution failed: {command}: {reason}")]
    ExecutionFailed { command: String, reason: String },

    #[error("Invalid command arguments: {0}")]
    InvalidArguments(String),

    #[error("Command I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Nested model call failed: {0}")]
    Nested(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O failed at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Corrupted conversation record {path}: {reason}")]
    Corrupted { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizerError {
    #[error("Token counting is not implemented for model {0}")]
    UnsupportedModel(String),
}
