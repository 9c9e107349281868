use colored::*;

use super::display::{display_budgets, display_tokens};
use crate::engine::Backend;
use crate::session::{InferOptions, Session};
use crate::text::FormatOptions;

/// Shared state for chat command handlers.
///
/// # Fields
///
/// * `session` - The session every prompt and command runs against
/// * `infer_options` - Stop sequence and output shaping applied to prompts
/// * `fix_output` - Whether generated text is passed through `fix_formatting`
pub(super) struct ChatContext<'a, B: Backend> {
    pub session: &'a mut Session<B>,
    pub infer_options: InferOptions,
    pub fix_output: bool,
}

/// Parses `<total> [input]` for the budget command.
pub(super) fn parse_budget_args(args: &[&str]) -> Result<(usize, Option<usize>), String> {
    let total = args
        .first()
        .ok_or_else(|| "Usage: /budget <total> [input]".to_string())?
        .parse::<usize>()
        .map_err(|e| format!("Invalid total token budget: {}", e))?;
    let input = match args.get(1) {
        Some(raw) => Some(
            raw.parse::<usize>()
                .map_err(|e| format!("Invalid input token budget: {}", e))?,
        ),
        None => None,
    };
    if args.len() > 2 {
        return Err("Usage: /budget <total> [input]".to_string());
    }
    Ok((total, input))
}

pub(super) fn handle_budget<B: Backend>(context: &mut ChatContext<'_, B>, args: &[&str]) {
    let (total, input) = match parse_budget_args(args) {
        Ok(parsed) => parsed,
        Err(message) => {
            println!("{}", message.yellow());
            return;
        }
    };

    println!("Reloading model with {} total tokens...", total);
    match context.session.set_token_budgets(total, input) {
        Ok(()) => display_budgets(&*context.session),
        Err(e) => println!("{} {}", "Error:".red(), e),
    }
}

pub(super) fn handle_clear_input<B: Backend>(context: &mut ChatContext<'_, B>) {
    context.session.clear_input_token_budget();
    display_budgets(&*context.session);
}

pub(super) fn handle_count<B: Backend>(context: &ChatContext<'_, B>, text: &str) {
    let session = &*context.session;
    match (session.count_tokens(text), session.is_prompt_within_limit(text)) {
        (Ok(count), Ok(true)) => println!("{} tokens (within the {} token limit)", count, session.total_token_budget()),
        (Ok(count), Ok(false)) => println!(
            "{} tokens ({})",
            count,
            format!("exceeds the {} token limit", session.total_token_budget()).red()
        ),
        (Err(e), _) | (_, Err(e)) => println!("{} {}", "Error:".red(), e),
    }
}

pub(super) fn handle_tokens<B: Backend>(context: &ChatContext<'_, B>, text: &str) {
    let result = context
        .session
        .tokenize(text)
        .and_then(|tokens| display_tokens(&*context.session, &tokens));
    if let Err(e) = result {
        println!("{} {}", "Error:".red(), e);
    }
}

pub(super) fn handle_generate<B: Backend>(context: &mut ChatContext<'_, B>, prompt: &str) {
    let result = context
        .session
        .infer(prompt, &context.infer_options)
        .and_then(|inference| inference.into_text());

    match result {
        Ok(text) => {
            let text = if context.fix_output {
                context.session.fix_formatting(&text, FormatOptions::default())
            } else {
                text
            };
            println!("{} {}", "[model]".cyan().bold(), text.trim());
        }
        Err(e) => println!("{} {}", "Error:".red(), e),
    }
}
