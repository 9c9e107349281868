#![allow(dead_code)]

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use gguf_llama::engine::{Backend, Completion, Engine, EngineMode, EngineOptions, FinishReason, LoadRequest, TokenId};
use gguf_llama::EngineError;

/// One recorded `Backend::load` call.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadCall {
    pub model_path: PathBuf,
    pub context_size: usize,
    pub mode: EngineMode,
    pub options: EngineOptions,
}

/// One recorded `Engine::complete` call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteCall {
    pub prompt: String,
    pub max_tokens: usize,
    pub stop: Option<String>,
}

#[derive(Debug, Default)]
pub struct Script {
    pub loads: Vec<LoadCall>,
    pub completions: Vec<CompleteCall>,
    pub embeddings: usize,
    /// Number of upcoming loads that fail
    pub failing_loads: usize,
    /// Text the engine "generates"
    pub reply: String,
    /// Return a completion with no choices
    pub empty_choices: bool,
}

/// In-memory backend: one token per character, scripted replies, every call recorded.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    pub script: Rc<RefCell<Script>>,
}

impl ScriptedBackend {
    pub fn replying(reply: &str) -> Self {
        let backend = Self::default();
        backend.script.borrow_mut().reply = reply.to_string();
        backend
    }

    pub fn load_count(&self) -> usize {
        self.script.borrow().loads.len()
    }

    pub fn last_load(&self) -> LoadCall {
        self.script.borrow().loads.last().cloned().expect("no load recorded")
    }

    pub fn completion_count(&self) -> usize {
        self.script.borrow().completions.len()
    }

    pub fn fail_next_loads(&self, n: usize) {
        self.script.borrow_mut().failing_loads = n;
    }
}

pub struct ScriptedEngine {
    mode: EngineMode,
    script: Rc<RefCell<Script>>,
}

impl Backend for ScriptedBackend {
    type Engine = ScriptedEngine;

    fn load(&self, request: &LoadRequest<'_>) -> Result<ScriptedEngine, EngineError> {
        let mut script = self.script.borrow_mut();
        if script.failing_loads > 0 {
            script.failing_loads -= 1;
            return Err(EngineError::Load(format!("cannot open {}", request.model_path.display())));
        }
        script.loads.push(LoadCall {
            model_path: request.model_path.to_path_buf(),
            context_size: request.context_size,
            mode: request.mode,
            options: request.options.clone(),
        });
        Ok(ScriptedEngine {
            mode: request.mode,
            script: Rc::clone(&self.script),
        })
    }
}

impl Engine for ScriptedEngine {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, EngineError> {
        Ok(text.chars().map(|c| c as TokenId).collect())
    }

    fn detokenize(&self, tokens: &[TokenId]) -> Result<String, EngineError> {
        tokens
            .iter()
            .map(|&id| {
                u32::try_from(id)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| EngineError::Tokenize(format!("unknown token {}", id)))
            })
            .collect()
    }

    fn complete(&mut self, prompt: &str, max_tokens: usize, stop: Option<&str>) -> Result<Completion, EngineError> {
        if self.mode != EngineMode::Generation {
            return Err(EngineError::Generate("loaded for embeddings".to_string()));
        }
        let mut script = self.script.borrow_mut();
        script.completions.push(CompleteCall {
            prompt: prompt.to_string(),
            max_tokens,
            stop: stop.map(str::to_string),
        });

        let mut text = script.reply.clone();
        let mut finish_reason = FinishReason::Length;
        if let Some(at) = stop.and_then(|stop| text.find(stop)) {
            text.truncate(at);
            finish_reason = FinishReason::Stop;
        }
        let mut completion = Completion::single("scripted", text, finish_reason, prompt.chars().count(), 1);
        if script.empty_choices {
            completion.choices.clear();
        }
        Ok(completion)
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>, EngineError> {
        if self.mode != EngineMode::Embedding {
            return Err(EngineError::Embed("loaded for generation".to_string()));
        }
        self.script.borrow_mut().embeddings += 1;
        Ok(vec![text.len() as f32, 0.5, -0.25])
    }
}
