use colored::*;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};

use crate::engine::{Backend, TokenId};
use crate::error::SessionError;
use crate::session::Session;

fn header(label: &str) -> Cell {
    Cell::new(label).fg(comfy_table::Color::Cyan).add_attribute(Attribute::Bold)
}

/// Displays each token id next to the text it decodes to.
pub fn display_tokens<B: Backend>(session: &Session<B>, tokens: &[TokenId]) -> Result<(), SessionError> {
    if tokens.is_empty() {
        println!("{}", "No tokens".yellow());
        return Ok(());
    }

    let tokenizer = session.tokenizer()?;
    let mut table = Table::new();
    table
        .set_header(vec![header("#"), header("Id"), header("Piece")])
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    for (i, &id) in tokens.iter().enumerate() {
        let piece = tokenizer.decode(&[id])?;
        table.add_row(vec![
            Cell::new(i),
            Cell::new(id),
            Cell::new(format!("{:?}", piece)),
        ]);
    }

    println!("{table}");
    println!("{} {}", "Total tokens:".bold(), tokens.len());
    Ok(())
}

/// Prints the current budgets, engine options, load state and mode of a session.
pub fn display_budgets<B: Backend>(session: &Session<B>) {
    let mut table = Table::new();
    table
        .set_header(vec![header("Setting"), header("Value")])
        .load_preset(comfy_table::presets::UTF8_FULL);

    let input = session
        .input_token_budget()
        .map(|n| n.to_string())
        .unwrap_or_else(|| "not set".to_string());
    let options = if session.options().is_empty() {
        "none".to_string()
    } else {
        session
            .options()
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let state = match session.loaded_mode() {
        Some(mode) => format!("loaded ({})", mode),
        None => "unloaded".to_string(),
    };

    table.add_row(vec![Cell::new("Model"), Cell::new(session.model_path().display())]);
    table.add_row(vec![Cell::new("Total tokens"), Cell::new(session.total_token_budget())]);
    table.add_row(vec![Cell::new("Input tokens"), Cell::new(input)]);
    table.add_row(vec![Cell::new("Engine options"), Cell::new(options)]);
    table.add_row(vec![Cell::new("State"), Cell::new(state)]);

    println!("{table}");
}
