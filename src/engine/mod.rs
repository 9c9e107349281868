//! # Engine Module
//!
//! Seams between a [`Session`](crate::session::Session) and the native inference
//! engine that does the actual work.
//!
//! A [`Backend`] knows how to open a model artifact and produce an [`Engine`].
//! The engine owns the loaded model and answers tokenization, generation and
//! embedding calls. The llama.cpp implementation lives in [`llama`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub mod completion;
pub mod llama;

pub use completion::{Completion, CompletionChoice, CompletionUsage, FinishReason};
pub use llama::{LlamaBackend, LlamaEngine};

/// Vocabulary id of a single token.
pub type TokenId = i32;

/// Extra options forwarded untouched to the engine when it is loaded.
pub type EngineOptions = BTreeMap<String, serde_json::Value>;

/// What the engine is loaded for. Switching requires a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    #[default]
    Generation,
    Embedding,
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineMode::Generation => write!(f, "generation"),
            EngineMode::Embedding => write!(f, "embedding"),
        }
    }
}

/// Everything a backend needs to instantiate an engine.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    pub model_path: &'a Path,
    /// Context window size in tokens
    pub context_size: usize,
    pub mode: EngineMode,
    pub options: &'a EngineOptions,
}

/// Factory for engines.
pub trait Backend {
    type Engine: Engine;

    /// Opens the model at `request.model_path` and returns a ready engine.
    fn load(&self, request: &LoadRequest<'_>) -> Result<Self::Engine, EngineError>;
}

/// A loaded model ready to accept prompts.
pub trait Engine {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, EngineError>;

    fn detokenize(&self, tokens: &[TokenId]) -> Result<String, EngineError>;

    /// Generates a completion for `prompt`, producing at most `max_tokens` tokens
    /// and stopping before the first occurrence of `stop`.
    fn complete(&mut self, prompt: &str, max_tokens: usize, stop: Option<&str>) -> Result<Completion, EngineError>;

    fn embed(&mut self, text: &str) -> Result<Vec<f32>, EngineError>;
}
