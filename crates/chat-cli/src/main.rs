//! Terminal chat client.
//!
//! Run with: cargo run -p chat-cli
//! One-shot: cargo run -p chat-cli -- ask --stream "Why is the sky blue?"
//!
//! Environment (a .env file is loaded if present):
//!   GROQ_API_KEY        - API key for the completion endpoint (required)
//!   CHAT_DATABASE_URL   - SQLite database for conversations
//!   CHAT_SHARE_BASE_URL - origin used in share links
//!   RUST_LOG            - log filter (default: info)

mod ask;
mod command;
mod repl;

use std::sync::Arc;

use chat_core::{Configuration, ConfigurationPatch};
use chat_engine::{ChatEngine, EngineSettings};
use chat_store::{PersistentStore, SqliteBackend};
use clap::{Parser, Subcommand};
use completion_client::CompletionClient;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "chat")]
#[command(about = "Chat with a hosted language model from the terminal")]
struct Args {
    /// Database URL. Falls back to CHAT_DATABASE_URL.
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session with saved conversations (the default)
    Chat,

    /// Send a single prompt and print the reply
    Ask {
        /// Prompt text
        #[arg(required = true)]
        prompt: Vec<String>,

        /// Print the reply as it is generated
        #[arg(long)]
        stream: bool,

        /// Model id (defaults to the saved configuration)
        #[arg(long)]
        model: Option<String>,

        /// Sampling temperature
        #[arg(long)]
        temperature: Option<f32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = EngineSettings::from_env();
    if let Some(url) = args.database {
        settings.database_url = url;
    }

    let backend = SqliteBackend::connect(&settings.database_url).await?;
    backend.migrate().await?;
    let store = PersistentStore::new(Arc::new(backend));

    let client = CompletionClient::from_env()?;

    match args.command.unwrap_or(Command::Chat) {
        Command::Chat => {
            let engine = ChatEngine::load(store, Arc::new(client), settings).await;
            repl::Repl::new(engine).run().await?;
            info!("Goodbye");
        }
        Command::Ask {
            prompt,
            stream,
            model,
            temperature,
        } => {
            let mut config: Configuration = store.load_config().await;
            config.apply(ConfigurationPatch {
                model,
                temperature,
                ..Default::default()
            });
            let display_name = store.load_display_name().await;
            ask::ask(&client, prompt.join(" "), config, display_name, stream).await?;
        }
    }

    Ok(())
}
