//! # Session Module
//!
//! A [`Session`] owns one model artifact and the engine instantiated from it.
//! It keeps the token budgets and the engine mode in sync with the loaded
//! engine, validates prompt lengths, and forwards generation and embedding
//! requests.
//!
//! ## State
//!
//! The session is either `Unloaded` or `Loaded` in exactly one
//! [`EngineMode`]. Loading happens at construction, on
//! [`Session::load`], after every budget change, and whenever a call needs
//! the other mode. Operations that need an engine retry a failed load once
//! before giving up with [`SessionError::NotLoaded`].

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::engine::{Backend, Completion, Engine, EngineMode, EngineOptions, LlamaBackend, LoadRequest, TokenId};
use crate::error::SessionError;
use crate::text::{self, FormatOptions};

mod tokenizer;
pub use tokenizer::Tokenizer;

/// Construction parameters for a [`Session`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Path to the `.gguf` model file
    pub model_path: PathBuf,
    /// Context window size, also the generation cap
    pub total_token_budget: usize,
    /// Optional limit for prompts; `None` or `Some(0)` means unset
    pub input_token_budget: Option<usize>,
    /// Mode the engine is first loaded in
    pub mode: EngineMode,
    /// Passed through to the backend untouched
    pub options: EngineOptions,
}

impl SessionConfig {
    pub fn new(model_path: impl Into<PathBuf>, total_token_budget: usize) -> Self {
        Self {
            model_path: model_path.into(),
            total_token_budget,
            input_token_budget: None,
            mode: EngineMode::default(),
            options: EngineOptions::new(),
        }
    }

    pub fn with_input_budget(mut self, input_token_budget: Option<usize>) -> Self {
        self.input_token_budget = input_token_budget;
        self
    }

    pub fn with_mode(mut self, mode: EngineMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// How [`Session::infer`] should shape its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferOptions {
    /// Return only the first choice's text instead of the whole completion
    pub text_only: bool,
    /// Generation stops before this string; empty is treated as unset
    pub stop: Option<String>,
    /// Append the stop sequence to the returned text
    pub keep_stop: bool,
}

impl Default for InferOptions {
    fn default() -> Self {
        Self {
            text_only: true,
            stop: None,
            keep_stop: true,
        }
    }
}

/// Result of [`Session::infer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Inference {
    Text(String),
    Completion(Completion),
}

impl Inference {
    /// Plain text of the inference, extracting the first choice if needed.
    pub fn into_text(self) -> Result<String, SessionError> {
        match self {
            Inference::Text(text) => Ok(text),
            Inference::Completion(completion) => completion.into_first_text(),
        }
    }
}

enum SessionState<E> {
    Unloaded,
    Loaded { engine: E, mode: EngineMode },
}

/// A model artifact plus the engine loaded from it.
pub struct Session<B: Backend = LlamaBackend> {
    backend: B,
    model_path: PathBuf,
    total_token_budget: usize,
    input_token_budget: Option<usize>,
    mode: EngineMode,
    options: EngineOptions,
    state: SessionState<B::Engine>,
}

impl Session<LlamaBackend> {
    /// Opens a session on llama.cpp and loads the model immediately.
    pub fn open(config: SessionConfig) -> Result<Self, SessionError> {
        Self::with_backend(LlamaBackend, config)
    }
}

impl<B: Backend> Session<B> {
    /// Creates a session on `backend` and loads the model immediately.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidBudget`] if the input budget exceeds the total
    ///   or the total is zero
    /// - [`SessionError::Load`] if the backend cannot open the model
    pub fn with_backend(backend: B, config: SessionConfig) -> Result<Self, SessionError> {
        let input_token_budget = validate_budgets(config.total_token_budget, config.input_token_budget)?;

        let mut session = Self {
            backend,
            model_path: config.model_path,
            total_token_budget: config.total_token_budget,
            input_token_budget,
            mode: config.mode,
            options: config.options,
            state: SessionState::Unloaded,
        };
        session.load()?;
        Ok(session)
    }

    /// (Re)instantiates the engine with the current budget, mode and options.
    ///
    /// The previous engine is dropped before the new one is created, so a
    /// failure leaves the session unloaded.
    pub fn load(&mut self) -> Result<(), SessionError> {
        self.state = SessionState::Unloaded;

        tracing::info!(
            path = %self.model_path.display(),
            context_size = self.total_token_budget,
            mode = %self.mode,
            "Loading model"
        );
        let request = LoadRequest {
            model_path: &self.model_path,
            context_size: self.total_token_budget,
            mode: self.mode,
            options: &self.options,
        };
        let engine = self.backend.load(&request).map_err(|source| {
            tracing::error!(path = %self.model_path.display(), error = %source, "Model load failed");
            SessionError::Load {
                path: self.model_path.clone(),
                source,
            }
        })?;

        self.state = SessionState::Loaded { engine, mode: self.mode };
        Ok(())
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn total_token_budget(&self) -> usize {
        self.total_token_budget
    }

    pub fn input_token_budget(&self) -> Option<usize> {
        self.input_token_budget
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, SessionState::Loaded { .. })
    }

    /// Mode of the currently loaded engine, `None` when unloaded.
    pub fn loaded_mode(&self) -> Option<EngineMode> {
        match &self.state {
            SessionState::Loaded { mode, .. } => Some(*mode),
            SessionState::Unloaded => None,
        }
    }

    /// Tokenizer view over the loaded engine.
    ///
    /// Read-only, so no reload is attempted: an unloaded session yields
    /// [`SessionError::NotLoaded`].
    pub fn tokenizer(&self) -> Result<Tokenizer<'_, B::Engine>, SessionError> {
        match &self.state {
            SessionState::Loaded { engine, .. } => Ok(Tokenizer::new(engine)),
            SessionState::Unloaded => Err(SessionError::NotLoaded {
                path: self.model_path.clone(),
                source: None,
            }),
        }
    }

    pub fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, SessionError> {
        Ok(self.tokenizer()?.encode(text)?)
    }

    pub fn untokenize(&self, tokens: &[TokenId]) -> Result<String, SessionError> {
        Ok(self.tokenizer()?.decode(tokens)?)
    }

    pub fn count_tokens(&self, text: &str) -> Result<usize, SessionError> {
        Ok(self.tokenize(text)?.len())
    }

    /// Checks whether `text` fits the prompt limit.
    ///
    /// The limit is always the total token budget. A configured input budget
    /// is reported in the logs but does not take part in the comparison.
    pub fn is_prompt_within_limit(&self, text: &str) -> Result<bool, SessionError> {
        let tokens = self.count_tokens(text)?;
        match self.input_token_budget {
            Some(input) => tracing::info!(
                tokens,
                input_limit = input,
                limit = self.total_token_budget,
                "Checking prompt length against total budget"
            ),
            None => tracing::info!(
                tokens,
                limit = self.total_token_budget,
                "Input limit not set, checking prompt length against total budget"
            ),
        }
        Ok(tokens <= self.total_token_budget)
    }

    /// Replaces both budgets and reloads the engine.
    ///
    /// `input` of `None` or `Some(0)` clears the input budget. Nothing changes
    /// if validation fails.
    pub fn set_token_budgets(&mut self, total: usize, input: Option<usize>) -> Result<(), SessionError> {
        let input = validate_budgets(total, input)?;

        self.total_token_budget = total;
        if input.is_none() && self.input_token_budget.is_some() {
            tracing::info!("Input token limit cleared");
        }
        self.input_token_budget = input;
        tracing::info!(total, input = ?input, "Token budgets updated");

        self.state = SessionState::Unloaded;
        self.load()
    }

    /// Clears the input budget. The engine does not depend on it, so no reload.
    pub fn clear_input_token_budget(&mut self) {
        self.input_token_budget = None;
        tracing::info!("Input token limit cleared");
    }

    /// Embeds `text`, reloading into embedding mode first if needed.
    pub fn create_embeddings(&mut self, text: &str) -> Result<Vec<f32>, SessionError> {
        self.ensure_loaded(EngineMode::Embedding)?;
        self.ensure_mode(EngineMode::Embedding)?;
        Ok(self.engine_mut()?.embed(text)?)
    }

    /// Generates a completion for `prompt`.
    ///
    /// The prompt length is checked before anything is sent to the engine. The
    /// whole total budget is offered as the generation cap.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotLoaded`] if the engine is gone and one reload fails
    /// - [`SessionError::PromptTooLong`] if the prompt exceeds the limit
    /// - [`SessionError::MalformedResult`] if text was requested and the engine
    ///   returned no choices
    pub fn infer(&mut self, prompt: &str, options: &InferOptions) -> Result<Inference, SessionError> {
        self.ensure_loaded(EngineMode::Generation)?;

        if !self.is_prompt_within_limit(prompt)? {
            return Err(SessionError::PromptTooLong {
                tokens: self.count_tokens(prompt)?,
                limit: self.total_token_budget,
            });
        }

        self.ensure_mode(EngineMode::Generation)?;

        let stop = options.stop.as_deref().filter(|s| !s.is_empty());
        let max_tokens = self.total_token_budget;
        let completion = self.engine_mut()?.complete(prompt, max_tokens, stop)?;

        if !options.text_only {
            return Ok(Inference::Completion(completion));
        }

        let mut text = completion.into_first_text()?;
        if options.keep_stop {
            if let Some(stop) = stop {
                text.push_str(stop);
            }
        }
        Ok(Inference::Text(text))
    }

    /// Shorthand for [`infer`](Self::infer) with default options.
    pub fn infer_text(&mut self, prompt: &str) -> Result<String, SessionError> {
        self.infer(prompt, &InferOptions::default())?.into_text()
    }

    /// Cleans up ragged model output. See [`text::fix_formatting`].
    pub fn fix_formatting(&self, text: &str, options: FormatOptions) -> String {
        text::fix_formatting(text, options)
    }

    /// Retries one load when unloaded. The retry goes straight into `mode` so
    /// a following [`ensure_mode`](Self::ensure_mode) has nothing left to do.
    fn ensure_loaded(&mut self, mode: EngineMode) -> Result<(), SessionError> {
        if self.is_loaded() {
            return Ok(());
        }

        tracing::warn!(path = %self.model_path.display(), %mode, "Model not loaded, trying a default reload");
        self.mode = mode;
        self.load().map_err(|err| SessionError::NotLoaded {
            path: self.model_path.clone(),
            source: match err {
                SessionError::Load { source, .. } => Some(source),
                _ => None,
            },
        })
    }

    fn ensure_mode(&mut self, mode: EngineMode) -> Result<(), SessionError> {
        if self.loaded_mode() == Some(mode) {
            return Ok(());
        }

        tracing::info!(from = %self.mode, to = %mode, "Switching engine mode");
        self.mode = mode;
        self.load()
    }

    fn engine_mut(&mut self) -> Result<&mut B::Engine, SessionError> {
        match &mut self.state {
            SessionState::Loaded { engine, .. } => Ok(engine),
            SessionState::Unloaded => Err(SessionError::NotLoaded {
                path: self.model_path.clone(),
                source: None,
            }),
        }
    }
}

/// Returns the normalized input budget, or an error if the pair is invalid.
fn validate_budgets(total: usize, input: Option<usize>) -> Result<Option<usize>, SessionError> {
    if total == 0 {
        return Err(SessionError::InvalidBudget(
            "total token budget must be greater than zero".to_string(),
        ));
    }
    match input.filter(|&input| input > 0) {
        Some(input) if input > total => Err(SessionError::InvalidBudget(format!(
            "input token budget {} exceeds total token budget {}",
            input, total
        ))),
        input => Ok(input),
    }
}
