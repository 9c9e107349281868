// Declare the display submodule
mod display;

// Declare the chat submodule (containing the chat_loop logic)
mod chat;

// Declare the command_handlers module
mod command_handlers;

// Re-export the public entry points
pub use chat::chat_loop;
pub use display::{display_budgets, display_tokens};
