use std::path::Path;

use llama_cpp::standard_sampler::StandardSampler;
use llama_cpp::{EmbeddingsParams, LlamaModel, LlamaParams, SessionParams, Token};
use serde_json::Value;

use super::{Backend, Completion, Engine, EngineMode, EngineOptions, FinishReason, LoadRequest, TokenId};
use crate::error::EngineError;

/// Loads GGUF models through llama.cpp.
#[derive(Debug, Clone, Copy, Default)]
pub struct LlamaBackend;

/// Session-level knobs resolved from the engine options.
///
/// Kept separately so a fresh `SessionParams` can be built for every completion.
#[derive(Debug, Clone, Copy, Default)]
struct SessionSettings {
    n_ctx: u32,
    n_batch: Option<u32>,
    n_threads: Option<u32>,
    n_threads_batch: Option<u32>,
    seed: Option<u32>,
}

impl SessionSettings {
    fn to_params(self) -> SessionParams {
        let mut params = SessionParams {
            n_ctx: self.n_ctx,
            ..Default::default()
        };
        if let Some(n_batch) = self.n_batch {
            params.n_batch = n_batch;
        }
        if let Some(n_threads) = self.n_threads {
            params.n_threads = n_threads;
        }
        if let Some(n_threads_batch) = self.n_threads_batch {
            params.n_threads_batch = n_threads_batch;
        }
        if let Some(seed) = self.seed {
            params.seed = seed;
        }
        params
    }
}

/// A llama.cpp model loaded for either generation or embeddings.
pub struct LlamaEngine {
    model: LlamaModel,
    model_name: String,
    mode: EngineMode,
    session: SessionSettings,
}

impl Backend for LlamaBackend {
    type Engine = LlamaEngine;

    fn load(&self, request: &LoadRequest<'_>) -> Result<LlamaEngine, EngineError> {
        let model_path = request.model_path;
        if !model_path.is_file() {
            return Err(EngineError::Load(format!("model file not found: {}", model_path.display())));
        }

        let n_ctx = u32::try_from(request.context_size)
            .map_err(|_| EngineError::Load(format!("context size {} is too large", request.context_size)))?;
        let mut llama_params = LlamaParams::default();
        let mut session = SessionSettings { n_ctx, ..Default::default() };
        apply_options(request.options, &mut llama_params, &mut session)?;

        tracing::info!(
            path = %model_path.display(),
            n_ctx,
            mode = %request.mode,
            n_gpu_layers = llama_params.n_gpu_layers,
            use_mmap = llama_params.use_mmap,
            use_mlock = llama_params.use_mlock,
            "Loading model via llama_cpp"
        );
        let model = LlamaModel::load_from_file(model_path, llama_params)
            .map_err(|e| EngineError::Load(format!("llama_cpp could not open {}: {}", model_path.display(), e)))?;
        tracing::info!("Successfully loaded model via llama_cpp.");

        Ok(LlamaEngine {
            model,
            model_name: model_name(model_path),
            mode: request.mode,
            session,
        })
    }
}

impl Engine for LlamaEngine {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, EngineError> {
        let tokens = self
            .model
            .tokenize_bytes(text, true, false)
            .map_err(|e| EngineError::Tokenize(e.to_string()))?;
        Ok(tokens.into_iter().map(|token| token.0).collect())
    }

    fn detokenize(&self, tokens: &[TokenId]) -> Result<String, EngineError> {
        let mut text = String::new();
        for &id in tokens {
            text.push_str(&self.model.token_to_piece(Token(id)));
        }
        Ok(text)
    }

    fn complete(&mut self, prompt: &str, max_tokens: usize, stop: Option<&str>) -> Result<Completion, EngineError> {
        if self.mode != EngineMode::Generation {
            return Err(EngineError::Generate(
                "engine was loaded for embeddings; reload it in generation mode".to_string(),
            ));
        }

        let prompt_tokens = self.tokenize(prompt)?.len();
        let room = (self.session.n_ctx as usize).saturating_sub(prompt_tokens);
        let budget = max_tokens.min(room);
        if budget == 0 {
            tracing::warn!(prompt_tokens, n_ctx = self.session.n_ctx, "No room left in context for completion");
            return Ok(Completion::single(&self.model_name, String::new(), FinishReason::Length, prompt_tokens, 0));
        }

        // Every call starts from an empty context.
        let mut session = self
            .model
            .create_session(self.session.to_params())
            .map_err(|e| EngineError::Generate(format!("failed to create LlamaSession: {}", e)))?;
        session
            .advance_context(prompt)
            .map_err(|e| EngineError::Generate(format!("failed to advance context: {}", e)))?;

        let handle = session
            .start_completing_with(StandardSampler::default(), budget)
            .map_err(|e| EngineError::Generate(format!("failed to start completion: {}", e)))?;
        tracing::debug!(budget, "Started completion generation");

        let pieces = handle.map(|token| self.model.token_to_piece(token));
        let (text, generated, finish_reason) = collect_until_stop(pieces, budget, stop);

        tracing::info!(prompt_tokens, generated, ?finish_reason, "Completion finished");
        Ok(Completion::single(&self.model_name, text, finish_reason, prompt_tokens, generated))
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>, EngineError> {
        if self.mode != EngineMode::Embedding {
            return Err(EngineError::Embed(
                "engine was loaded for generation; reload it in embedding mode".to_string(),
            ));
        }

        let mut embeddings = self
            .model
            .embeddings(&[text], EmbeddingsParams::default())
            .map_err(|e| EngineError::Embed(e.to_string()))?;
        if embeddings.is_empty() {
            return Err(EngineError::Embed("engine returned no embedding".to_string()));
        }
        Ok(embeddings.swap_remove(0))
    }
}

/// Accumulates generated pieces until the stop sequence shows up, the budget
/// is spent, or the pieces run out.
///
/// The stop sequence may span several pieces and is cut from the text.
/// Running out before the budget means end of sequence, so it finishes with
/// `Stop`; spending the budget finishes with `Length`.
fn collect_until_stop<I>(pieces: I, budget: usize, stop: Option<&str>) -> (String, usize, FinishReason)
where
    I: IntoIterator<Item = String>,
{
    let stop = stop.filter(|s| !s.is_empty());
    let mut text = String::new();
    let mut generated = 0;
    if budget == 0 {
        return (text, generated, FinishReason::Length);
    }

    for piece in pieces {
        generated += 1;
        text.push_str(&piece);
        if let Some(at) = stop.and_then(|stop| text.find(stop)) {
            text.truncate(at);
            return (text, generated, FinishReason::Stop);
        }
        if generated >= budget {
            return (text, generated, FinishReason::Length);
        }
    }
    (text, generated, FinishReason::Stop)
}

fn apply_options(
    options: &EngineOptions,
    llama_params: &mut LlamaParams,
    session: &mut SessionSettings,
) -> Result<(), EngineError> {
    for (key, value) in options {
        match key.as_str() {
            "n_gpu_layers" => llama_params.n_gpu_layers = option_u32(key, value)?,
            "use_mmap" => llama_params.use_mmap = option_bool(key, value)?,
            "use_mlock" => llama_params.use_mlock = option_bool(key, value)?,
            "n_batch" => session.n_batch = Some(option_u32(key, value)?),
            "n_threads" => session.n_threads = Some(option_u32(key, value)?),
            "n_threads_batch" => session.n_threads_batch = Some(option_u32(key, value)?),
            "seed" => session.seed = Some(option_u32(key, value)?),
            other => tracing::warn!(option = other, "Ignoring unknown engine option"),
        }
    }
    Ok(())
}

fn option_u32(key: &str, value: &Value) -> Result<u32, EngineError> {
    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| EngineError::Load(format!("engine option '{}' must be a non-negative integer, got {}", key, value)))
}

fn option_bool(key: &str, value: &Value) -> Result<bool, EngineError> {
    value
        .as_bool()
        .ok_or_else(|| EngineError::Load(format!("engine option '{}' must be a boolean, got {}", key, value)))
}

fn model_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("model")
        .to_string()
}
