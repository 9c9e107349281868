//! # gguf_llama
//!
//! Session wrapper around a llama.cpp model: loads a quantized GGUF file,
//! keeps context-window budgets in sync with the loaded engine, tokenizes,
//! generates, embeds, and cleans up ragged output text.
//!
//! ```no_run
//! use gguf_llama::{Session, SessionConfig};
//!
//! let mut session = Session::open(SessionConfig::new("models/llama-2-7b-chat.Q4_K_M.gguf", 512))?;
//! let answer = session.infer_text("Q: What is the capital of France?\nA:")?;
//! println!("{}", answer);
//! # Ok::<(), gguf_llama::SessionError>(())
//! ```

pub mod chat;
pub mod config;
pub mod engine;
pub mod error;
pub mod session;
pub mod text;

pub use engine::{Backend, Completion, Engine, EngineMode, EngineOptions, LlamaBackend, TokenId};
pub use error::{EngineError, SessionError};
pub use session::{InferOptions, Inference, Session, SessionConfig, Tokenizer};
pub use text::{fix_formatting, FormatOptions};
