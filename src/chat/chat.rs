use std::error::Error;
use std::io::Write;

use colored::*;
use rustyline::DefaultEditor;

use crate::engine::Backend;
use crate::session::{InferOptions, Session};

// Import items from the sibling module
use super::command_handlers::{
    ChatContext,
    handle_budget,
    handle_clear_input,
    handle_count,
    handle_generate,
    handle_tokens,
};
use super::display::display_budgets;

fn print_help() {
    println!("\n{}", "Chat Commands".cyan());
    println!("{}", "=".repeat(60).bright_cyan());
    println!("{}          - Exit the chat", "/exit, /quit".green());
    println!("{}                 - Show this help message", "/help".green());
    println!("{}                - Clear the screen", "/clear".green());
    println!("{}                 - Show budgets and model state", "/info".green());
    println!("{} - Set token budgets and reload the model", "/budget <total> [input]".green());
    println!("{}          - Clear the input token limit", "/clear-input".green());
    println!("{}          - Count tokens in text", "/count <text>".green());
    println!("{}         - Show the tokens of text", "/tokens <text>".green());
    println!("Anything else is sent to the model as a prompt.");
    println!();
}

// --- Main Chat Loop ---

/// Runs an interactive prompt loop against `session` until the user exits.
pub fn chat_loop<B: Backend>(
    session: &mut Session<B>,
    infer_options: InferOptions,
    fix_output: bool,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("Starting chat session");
    print_help();

    let mut rl = DefaultEditor::new()?;
    let mut context = ChatContext {
        session,
        infer_options,
        fix_output,
    };

    loop {
        match rl.readline("[you] > ") {
            Ok(input) => {
                let input_trimmed = input.trim();
                if input_trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input_trimmed);

                let (command, rest) = match input_trimmed.split_once(char::is_whitespace) {
                    Some((command, rest)) => (command, rest.trim()),
                    None => (input_trimmed, ""),
                };

                match command.to_lowercase().as_str() {
                    "/exit" | "/quit" | "/bye" => {
                        println!("Goodbye!");
                        break;
                    }
                    "/help" => print_help(),
                    "/clear" => {
                        print!("\x1B[2J\x1B[1;1H");
                        std::io::stdout().flush()?;
                    }
                    "/info" => display_budgets(&*context.session),
                    "/budget" => {
                        let args: Vec<&str> = rest.split_whitespace().collect();
                        handle_budget(&mut context, &args);
                    }
                    "/clear-input" => handle_clear_input(&mut context),
                    "/count" => handle_count(&context, rest),
                    "/tokens" => handle_tokens(&context, rest),
                    cmd if cmd.starts_with('/') => {
                        println!("Unknown command {}. Type /help for the list.", cmd.yellow());
                    }
                    _ => handle_generate(&mut context, input_trimmed),
                }
            }
            Err(_) => {
                println!("Goodbye!");
                break;
            }
        }
    }
    Ok(())
}
