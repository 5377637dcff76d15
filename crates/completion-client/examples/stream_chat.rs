//! Stream a single reply from the completion endpoint.
//!
//! Run with: cargo run -p completion-client --example stream_chat
//! Or with a custom message: cargo run -p completion-client --example stream_chat -- "Your message here"
//!
//! Make sure to set environment variables in .env:
//!   GROQ_API_KEY - API key for authentication

use std::env;
use std::io::Write;

use chat_core::{CancelToken, Completion, CompletionRequest, Configuration};
use completion_client::CompletionClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let message_text = if args.len() > 1 {
        args[1..].join(" ")
    } else {
        "Hello! Please respond with a short greeting.".to_string()
    };

    let client = CompletionClient::from_env()?;
    let config = Configuration::default();

    println!("Client initialized: {}", client.name());
    println!("Endpoint: {}", client.config().completions_url());
    println!("Model: {}", config.model);
    println!();
    println!("Sending: \"{}\"\n", message_text);

    let request = CompletionRequest::new(message_text, Vec::new(), config);
    let mut printed = 0;
    let text = client
        .stream_complete(request, &CancelToken::new(), &mut |text: &str| {
            print!("{}", &text[printed..]);
            let _ = std::io::stdout().flush();
            printed = text.len();
        })
        .await?;

    println!("\n\n({} chars)", text.chars().count());

    Ok(())
}
