use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;

/// Why the engine stopped producing tokens for a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// End of sequence or stop sequence reached
    Stop,
    /// Token limit reached
    Length,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub text: String,
    pub index: usize,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Text-completion object returned by an engine.
///
/// Shaped like the OpenAI `text_completion` object so it can be printed or
/// serialized as-is when the caller asks for the raw result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub id: String,
    pub object: String,
    /// Unix timestamp (seconds)
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: CompletionUsage,
}

impl Completion {
    /// Builds a single-choice completion stamped with a fresh id and the current time.
    pub fn single(
        model: impl Into<String>,
        text: String,
        finish_reason: FinishReason,
        prompt_tokens: usize,
        completion_tokens: usize,
    ) -> Self {
        Self {
            id: format!("cmpl-{}", Uuid::new_v4()),
            object: "text_completion".to_string(),
            created: Utc::now().timestamp(),
            model: model.into(),
            choices: vec![CompletionChoice {
                text,
                index: 0,
                finish_reason,
            }],
            usage: CompletionUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
        }
    }

    /// Returns the text of the first choice.
    pub fn first_text(&self) -> Result<&str, SessionError> {
        self.choices
            .first()
            .map(|choice| choice.text.as_str())
            .ok_or_else(|| SessionError::MalformedResult("completion has no choices".to_string()))
    }

    pub fn into_first_text(self) -> Result<String, SessionError> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| SessionError::MalformedResult("completion has no choices".to_string()))
    }
}
