use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use gguf_llama::chat::{self, display_tokens};
use gguf_llama::config::Settings;
use gguf_llama::engine::EngineMode;
use gguf_llama::session::{InferOptions, Inference, Session};
use gguf_llama::text::{fix_formatting, FormatOptions};

/// Run prompts against a local GGUF model
#[derive(Parser)]
#[command(name = "gguf-llama", version, about)]
struct Cli {
    /// Directory holding default.toml and an optional local.toml
    #[arg(long, default_value = "config")]
    config: PathBuf,

    /// Model file, overrides model.path
    #[arg(long)]
    model: Option<PathBuf>,

    /// Context window size, overrides model.total_tokens
    #[arg(long)]
    total_tokens: Option<usize>,

    /// Prompt limit, overrides model.input_tokens
    #[arg(long)]
    input_tokens: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a completion for a prompt
    Infer {
        prompt: String,
        /// Stop generating before this string
        #[arg(long)]
        stop: Option<String>,
        /// Do not append the stop string to the output
        #[arg(long)]
        drop_stop: bool,
        /// Print the whole completion object as JSON
        #[arg(long)]
        raw: bool,
        /// Flatten the generated text with fix-format rules
        #[arg(long)]
        fix: bool,
    },
    /// Show the tokens of a text
    Tokenize { text: String },
    /// Count tokens and check them against the budget
    Count { text: String },
    /// Print the embedding vector of a text as JSON
    Embed { text: String },
    /// Clean up text read from stdin
    FixFormat {
        #[arg(long)]
        letters_only: bool,
        #[arg(long)]
        strip_lists: bool,
    },
    /// Interactive prompt loop
    Chat {
        /// Flatten every answer with fix-format rules
        #[arg(long)]
        fix: bool,
    },
}

/// Installs the tracing subscriber. Logs go to a daily rolling file when
/// `logging.file` is set, to stderr otherwise.
fn init_logging(settings: &Settings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.to_lowercase()));

    match settings.logging.file.as_deref() {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "gguf-llama");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_writer(non_blocking)
                // Disable ANSI colors for cleaner log files
                .with_ansi(false)
                .with_line_number(true)
                .with_file(true)
                .with_thread_ids(true)
                .with_target(false)
                .with_env_filter(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_env_filter(filter)
                .init();
            None
        }
    }
}

/// Opens a session in `mode`, or in the configured mode when `None`.
fn open_session(settings: &Settings, mode: Option<EngineMode>) -> anyhow::Result<Session> {
    let config = settings.session_config_for(mode);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} {wide_msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!("Loading model from {}...", config.model_path.display()));

    let session = Session::open(config);
    pb.finish_and_clear();
    Ok(session?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::from_dir(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    if let Some(model) = cli.model {
        settings.model.path = model;
    }
    if let Some(total) = cli.total_tokens {
        settings.model.total_tokens = total;
    }
    if cli.input_tokens.is_some() {
        settings.model.input_tokens = cli.input_tokens;
    }
    settings.validate()?;

    let _guard = init_logging(&settings);
    info!(model = %settings.model.path.display(), "Settings loaded");

    match cli.command {
        Command::Infer { prompt, stop, drop_stop, raw, fix } => {
            let mut session = open_session(&settings, Some(EngineMode::Generation))?;
            let defaults = settings.infer_options();
            let options = InferOptions {
                text_only: !raw,
                stop: stop.or(defaults.stop),
                keep_stop: defaults.keep_stop && !drop_stop,
            };
            match session.infer(&prompt, &options)? {
                Inference::Text(text) if fix => println!("{}", fix_formatting(&text, FormatOptions::default())),
                Inference::Text(text) => println!("{}", text),
                completion => println!("{}", serde_json::to_string_pretty(&completion)?),
            }
        }
        Command::Tokenize { text } => {
            let session = open_session(&settings, None)?;
            let tokens = session.tokenize(&text)?;
            display_tokens(&session, &tokens)?;
        }
        Command::Count { text } => {
            let session = open_session(&settings, None)?;
            let count = session.count_tokens(&text)?;
            let fits = session.is_prompt_within_limit(&text)?;
            println!("{} tokens, limit {} ({})", count, session.total_token_budget(), if fits { "fits" } else { "too long" });
        }
        Command::Embed { text } => {
            let mut session = open_session(&settings, Some(EngineMode::Embedding))?;
            let embedding = session.create_embeddings(&text)?;
            println!("{}", serde_json::to_string(&embedding)?);
        }
        Command::FixFormat { letters_only, strip_lists } => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            let options = FormatOptions {
                strip_non_letters: letters_only,
                strip_list_markers: strip_lists,
            };
            println!("{}", fix_formatting(input.trim_end(), options));
        }
        Command::Chat { fix } => {
            let mut session = open_session(&settings, None)?;
            chat::chat_loop(&mut session, settings.infer_options(), fix).map_err(|e| anyhow!(e))?;
        }
    }

    Ok(())
}
