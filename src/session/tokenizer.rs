use crate::engine::{Engine, TokenId};
use crate::error::EngineError;

/// Tokenizer view over a loaded engine.
///
/// Borrowed from the session, so it always reflects the engine that is
/// currently loaded and cannot outlive a reload.
pub struct Tokenizer<'a, E: Engine> {
    engine: &'a E,
}

impl<'a, E: Engine> Tokenizer<'a, E> {
    pub(crate) fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    pub fn encode(&self, text: &str) -> Result<Vec<TokenId>, EngineError> {
        self.engine.tokenize(text)
    }

    pub fn decode(&self, tokens: &[TokenId]) -> Result<String, EngineError> {
        self.engine.detokenize(tokens)
    }

    pub fn count(&self, text: &str) -> Result<usize, EngineError> {
        Ok(self.encode(text)?.len())
    }
}
