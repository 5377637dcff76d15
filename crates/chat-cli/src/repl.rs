//! Interactive session over the conversation engine.

use std::io::Write;

use chat_core::{find_model, format_param_count, ConfigurationPatch, MODEL_CATALOG};
use chat_engine::{ChatEngine, EngineEvent, SendOutcome, SkipReason, View};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::command::{self, ReplCommand, HELP};

type Input = Lines<BufReader<Stdin>>;

pub struct Repl {
    engine: ChatEngine,
    input: Input,
    input_open: bool,
}

impl Repl {
    pub fn new(engine: ChatEngine) -> Self {
        Self {
            engine,
            input: BufReader::new(tokio::io::stdin()).lines(),
            input_open: true,
        }
    }

    /// Read and run commands until `/quit` or end of input.
    pub async fn run(&mut self) -> std::io::Result<()> {
        println!("Type /help for commands.");
        self.print_active();

        loop {
            prompt("> ");
            let Some(line) = self.input.next_line().await? else {
                break;
            };

            let command = match command::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };

            if command == ReplCommand::Quit {
                break;
            }
            self.execute(command).await;
        }

        // Leave nothing half-written in the store.
        self.engine.stop_generating().await;
        Ok(())
    }

    async fn execute(&mut self, command: ReplCommand) {
        match command {
            ReplCommand::Say(text) => {
                let engine = self.engine.clone();
                let task = tokio::spawn(async move { engine.send_message(&text, None).await });
                self.follow(task).await;
            }
            ReplCommand::Regenerate => {
                let engine = self.engine.clone();
                let task = tokio::spawn(async move { engine.regenerate().await });
                self.follow(task).await;
            }
            ReplCommand::Stop => {
                if !self.engine.stop_generating().await {
                    println!("Nothing is being generated.");
                }
            }
            ReplCommand::New => {
                self.engine.new_conversation().await;
                self.print_active();
            }
            ReplCommand::List => self.print_list(),
            ReplCommand::Select(n) => match self.nth_id(n) {
                Some(id) => {
                    if let Err(e) = self.engine.select_conversation(&id).await {
                        println!("{}", e);
                    }
                    self.print_active();
                }
                None => println!("No conversation {}.", n),
            },
            ReplCommand::Delete(n) => {
                let id = match n {
                    Some(n) => self.nth_id(n),
                    None => Some(self.engine.active_id()),
                };
                match id {
                    Some(id) if self.engine.delete_conversation(&id).await => {
                        println!("Deleted.");
                        self.print_active();
                    }
                    _ => println!("No such conversation."),
                }
            }
            ReplCommand::Clear => {
                self.engine.clear_conversation().await;
                println!("Cleared.");
            }
            ReplCommand::Share => match self.engine.share_active_conversation().await {
                Ok(link) => println!("Shared: {}", link.address),
                Err(e) => println!("Could not share: {}", e),
            },
            ReplCommand::Open(address) => match self.engine.navigate(&address).await {
                Ok(View::Conversation(_)) => self.print_active(),
                Ok(View::Shared(snapshot)) => {
                    println!("Shared conversation (read-only): {}", snapshot.title);
                    println!("Shared at {}", snapshot.shared_at.format("%Y-%m-%d %H:%M UTC"));
                    for message in &snapshot.messages {
                        println!("{}: {}", message.role.as_str(), message.content);
                    }
                    println!("(/open / to return)");
                }
                Err(e) => println!("{}", e),
            },
            ReplCommand::Where => println!("{}", self.engine.current_address()),
            ReplCommand::Models => {
                let current = self.engine.config().model;
                for model in MODEL_CATALOG {
                    let marker = if model.id == current { "*" } else { " " };
                    println!(
                        "{} {:<45} {} - {} ({} parameters)",
                        marker,
                        model.id,
                        model.name,
                        model.description,
                        format_param_count(model.params)
                    );
                }
            }
            ReplCommand::Model(id) => {
                if find_model(&id).is_none() {
                    println!("Note: {} is not in the catalog.", id);
                }
                self.configure(ConfigurationPatch::default().model(id)).await;
            }
            ReplCommand::Temperature(value) => {
                self.configure(ConfigurationPatch::default().temperature(value))
                    .await
            }
            ReplCommand::MaxTokens(value) => {
                self.configure(ConfigurationPatch::default().max_output_tokens(value))
                    .await
            }
            ReplCommand::TopP(value) => {
                self.configure(ConfigurationPatch::default().top_p(value))
                    .await
            }
            ReplCommand::Name(Some(name)) => match self.engine.set_display_name(&name).await {
                Ok(name) => println!("Hello, {}.", name),
                Err(e) => println!("{}", e),
            },
            ReplCommand::Name(None) => {
                self.engine.clear_display_name().await;
                println!("Display name cleared.");
            }
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Quit => {}
        }
    }

    /// Print a reply as it streams, accepting `/stop` until it ends.
    async fn follow(&mut self, mut task: JoinHandle<SendOutcome>) {
        let mut events = self.engine.subscribe();
        let mut shown = String::new();

        let outcome = loop {
            tokio::select! {
                result = &mut task => {
                    break result.unwrap_or_else(|e| {
                        warn!("Send task failed: {}", e);
                        SendOutcome::Failed
                    });
                }
                Some(event) = events.recv() => {
                    if let EngineEvent::MessageUpdated { conversation_id, message_id } = event {
                        let content = self
                            .engine
                            .conversation(&conversation_id)
                            .and_then(|c| c.message(&message_id).map(|m| m.content.clone()));
                        if let Some(content) = content {
                            show(&mut shown, &content);
                        }
                    }
                }
                line = self.input.next_line(), if self.input_open => {
                    match line {
                        Ok(Some(line)) if line.trim() == "/stop" => {
                            self.engine.stop_generating().await;
                        }
                        Ok(Some(_)) => debug!("Ignoring input while a reply is streaming"),
                        Ok(None) | Err(_) => self.input_open = false,
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    self.engine.stop_generating().await;
                }
            }
        };

        if !shown.is_empty() {
            println!();
        }
        match outcome {
            SendOutcome::Completed => {}
            SendOutcome::Stopped => println!("[stopped]"),
            SendOutcome::Failed => {
                if let Some(error) = self.engine.last_error() {
                    println!("{}", error);
                }
            }
            SendOutcome::Skipped(reason) => println!("{}", skip_message(reason)),
        }
    }

    async fn configure(&self, patch: ConfigurationPatch) {
        let config = self.engine.update_configuration(patch).await;
        println!(
            "model {} | temperature {} | max tokens {} | top-p {}",
            config.model, config.temperature, config.max_output_tokens, config.top_p
        );
    }

    fn nth_id(&self, n: usize) -> Option<chat_core::ConversationId> {
        self.engine
            .conversations()
            .into_iter()
            .nth(n.checked_sub(1)?)
            .map(|c| c.id)
    }

    fn print_list(&self) {
        let active = self.engine.active_id();
        for (i, conversation) in self.engine.conversations().iter().enumerate() {
            let marker = if conversation.id == active { "*" } else { " " };
            let loading = if self.engine.is_loading(&conversation.id) {
                " (replying)"
            } else {
                ""
            };
            println!(
                "{} {:>2}. {} [{} messages]{}",
                marker,
                i + 1,
                conversation.title,
                conversation.messages.len(),
                loading
            );
        }
    }

    fn print_active(&self) {
        let conversation = self.engine.active_conversation();
        println!("-- {} ({}) --", conversation.title, self.engine.current_address());
        for message in &conversation.messages {
            println!("{}: {}", message.role.as_str(), message.content);
        }
    }
}

/// Print the part of `content` not yet on screen.
///
/// Replies only grow while streaming; anything else (an apology replacing
/// partial text) is printed on a new line.
fn show(shown: &mut String, content: &str) {
    if let Some(rest) = content.strip_prefix(shown.as_str()) {
        print!("{}", rest);
    } else {
        print!("\n{}", content);
    }
    let _ = std::io::stdout().flush();
    *shown = content.to_string();
}

fn skip_message(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Busy => "Still replying; /stop first.",
        SkipReason::BlankText => "Nothing to send.",
        SkipReason::TargetNotFound => "That message cannot be regenerated.",
        SkipReason::NoAssistantMessage => "There is no reply to regenerate yet.",
    }
}

fn prompt(text: &str) {
    print!("{}", text);
    let _ = std::io::stdout().flush();
}
