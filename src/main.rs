//! # docqa CLI
//!
//! Ask questions about PDF and Word documents from the terminal, a browser,
//! or a JSON batch file.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa chat` | Interactive question loop |
//! | `docqa ask "<question>"` | Answer one question and exit |
//! | `docqa search "<query>"` | Show the chunks retrieval selects for a query |
//! | `docqa batch [FILE]` | Answer a JSON batch from a file or stdin |
//! | `docqa index` | Load, chunk and embed the documents; print counts |
//! | `docqa serve` | Start the web UI and JSON API |
//!
//! ## Examples
//!
//! ```bash
//! # Chat about two files
//! docqa chat --doc policy.pdf --doc terms.docx
//!
//! # One-shot question against the configured document root
//! docqa ask "What is the deductible?"
//!
//! # Batch over a remote document
//! echo '{"documents": "https://example.com/policy.pdf", "questions": ["What is covered?"]}' | docqa batch
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;

use docqa::batch::process_batch_str;
use docqa::config::{self, Config};
use docqa::engine::{AnswerEngine, AnswerOutcome};
use docqa::{search, server, shell};

const DEFAULT_CONFIG: &str = "./config/docqa.toml";

/// docqa: retrieval-augmented question answering over PDF and Word documents.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Retrieval-augmented question answering over PDF and Word documents",
    version,
    long_about = "docqa loads PDF and Word documents, splits them into overlapping chunks, \
    embeds them into an in-memory index, and answers questions by passing the most relevant \
    excerpts to a hosted language model."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docqa.toml`. If that default file does not
    /// exist, built-in defaults are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Extra document to load (path or http(s) URL). Repeatable.
    #[arg(long = "doc", global = true)]
    docs: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive question loop. Type `exit` or `quit` to stop.
    Chat,

    /// Answer a single question.
    Ask { question: String },

    /// Show retrieved chunks for a query.
    Search {
        query: String,

        /// Number of chunks to return (defaults to `[retrieval].k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer a JSON batch: `{"documents"?: url, "questions": [...]}`.
    ///
    /// Reads from FILE, or stdin when omitted. Writes the JSON result to stdout.
    Batch { file: Option<PathBuf> },

    /// Load, chunk and embed the documents, then print counts.
    Index,

    /// Start the web UI and JSON API on `[server].bind`.
    Serve,
}

fn load_cli_config(cli: &Cli) -> Result<Config> {
    if cli.config == PathBuf::from(DEFAULT_CONFIG) && !cli.config.exists() {
        log::info!("{} not found, using built-in defaults", DEFAULT_CONFIG);
        return Ok(Config::minimal());
    }
    config::load_config(&cli.config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let cfg = load_cli_config(&cli)?;

    match cli.command {
        Commands::Chat => {
            let engine = AnswerEngine::from_config(&cfg, &cli.docs).await?;
            let stdin = std::io::stdin();
            shell::run_repl(&engine, stdin.lock(), std::io::stdout()).await?;
        }
        Commands::Ask { question } => {
            let engine = AnswerEngine::from_config(&cfg, &cli.docs).await?;
            match engine.answer(&question, &[]).await {
                AnswerOutcome::Answered(answer) => println!("{}", answer),
                AnswerOutcome::Failed(message) => anyhow::bail!(message),
            }
        }
        Commands::Search { query, k } => {
            search::run_search(&cfg, &cli.docs, &query, k).await?;
        }
        Commands::Batch { file } => {
            let input = match file {
                Some(path) => std::fs::read_to_string(&path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let engine = AnswerEngine::from_config(&cfg, &cli.docs).await?;
            let result = process_batch_str(&engine, &input).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Index => {
            let engine = AnswerEngine::from_config(&cfg, &cli.docs).await?;
            println!("Pages loaded: {}", engine.documents().len());
            println!("Chunks indexed: {}", engine.index().len());
            println!("Embedding model: {}", engine.index().provider().model_name());
        }
        Commands::Serve => {
            server::run_server(&cfg, &cli.docs).await?;
        }
    }

    Ok(())
}
