use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by an inference engine implementation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The model artifact could not be opened or instantiated.
    #[error("failed to load model: {0}")]
    Load(String),
    #[error("tokenization failed: {0}")]
    Tokenize(String),
    #[error("generation failed: {0}")]
    Generate(String),
    #[error("embedding failed: {0}")]
    Embed(String),
}

/// Errors returned by [`Session`](crate::session::Session) operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The engine could not open the model artifact.
    #[error("could not load model from {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    /// An operation needed a loaded engine and the single reload attempt failed
    /// (or no reload was possible from a read-only call).
    #[error("model {} is not loaded; provide model settings when creating the session or call load()", path.display())]
    NotLoaded {
        path: PathBuf,
        #[source]
        source: Option<EngineError>,
    },

    #[error("invalid token budget: {0}")]
    InvalidBudget(String),

    #[error("prompt is too long: {tokens} tokens, limit is {limit}")]
    PromptTooLong { tokens: usize, limit: usize },

    #[error("malformed engine result: {0}")]
    MalformedResult(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
