//! One-shot completion without a conversation.

use std::io::Write;

use chat_core::{CancelToken, Completion, CompletionError, CompletionRequest, Configuration};
use completion_client::CompletionClient;
use tracing::info;

/// Send a single prompt with no history and print the reply.
///
/// When streaming, Ctrl-C stops the reply and keeps what arrived.
pub async fn ask(
    client: &CompletionClient,
    prompt: String,
    config: Configuration,
    display_name: Option<String>,
    stream: bool,
) -> Result<String, CompletionError> {
    info!("Asking {} (model: {}, stream: {})", client.name(), config.model, stream);
    let request = CompletionRequest::new(prompt, Vec::new(), config).with_display_name(display_name);

    if !stream {
        let text = client.complete(request).await?;
        println!("{}", text);
        return Ok(text);
    }

    let cancel = CancelToken::new();
    let stopper = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut printed = 0;
    let result = client
        .stream_complete(request, &cancel, &mut |text: &str| {
            print!("{}", &text[printed.min(text.len())..]);
            let _ = std::io::stdout().flush();
            printed = text.len();
        })
        .await;
    stopper.abort();

    let text = result?;
    println!();
    if cancel.is_cancelled() {
        println!("[stopped]");
    }
    Ok(text)
}
