//! Parsing of interactive session input.

use thiserror::Error;

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    /// Plain text to send in the active conversation.
    Say(String),
    New,
    List,
    /// Activate a conversation by its 1-based position in `/list`.
    Select(usize),
    /// Delete by position, or the active conversation.
    Delete(Option<usize>),
    Clear,
    Regenerate,
    Stop,
    Share,
    /// Open an address (`/c/<id>`, a share link, ...).
    Open(String),
    Where,
    Models,
    Model(String),
    Temperature(f32),
    MaxTokens(u32),
    TopP(f32),
    /// Set the display name, or clear it with `None`.
    Name(Option<String>),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command: /{0} (try /help)")]
    Unknown(String),

    #[error("/{command} needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("invalid value for /{command}: {value}")]
    InvalidValue { command: &'static str, value: String },
}

pub const HELP: &str = "\
Type a message to send it. Commands:
  /new                 start a new conversation
  /list                list conversations
  /select <n>          switch to conversation n
  /delete [n]          delete conversation n (default: active)
  /clear               remove every message from the active conversation
  /regen               regenerate the last reply
  /stop                stop the reply being generated
  /share               create a read-only link to the active conversation
  /open <address>      open a conversation or shared link
  /where               print the current address
  /models              list available models
  /model <id>          switch model
  /temp <value>        set temperature
  /max-tokens <n>      set maximum output tokens
  /top-p <value>       set top-p
  /name [name]         set your display name (no argument clears it)
  /help                show this help
  /quit                exit";

/// Parse a line of input. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<ReplCommand>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(ReplCommand::Say(line.to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let arg = (!arg.is_empty()).then_some(arg);

    let command = match name {
        "new" => ReplCommand::New,
        "list" | "ls" => ReplCommand::List,
        "select" => ReplCommand::Select(position("select", arg)?),
        "delete" | "rm" => ReplCommand::Delete(match arg {
            Some(_) => Some(position("delete", arg)?),
            None => None,
        }),
        "clear" => ReplCommand::Clear,
        "regen" | "regenerate" => ReplCommand::Regenerate,
        "stop" => ReplCommand::Stop,
        "share" => ReplCommand::Share,
        "open" => ReplCommand::Open(required("open", "an address", arg)?.to_string()),
        "where" => ReplCommand::Where,
        "models" => ReplCommand::Models,
        "model" => ReplCommand::Model(required("model", "a model id", arg)?.to_string()),
        "temp" | "temperature" => ReplCommand::Temperature(number("temp", "a number", arg)?),
        "max-tokens" => ReplCommand::MaxTokens(number("max-tokens", "a token count", arg)?),
        "top-p" => ReplCommand::TopP(number("top-p", "a number", arg)?),
        "name" => ReplCommand::Name(arg.map(str::to_string)),
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn required<'a>(
    command: &'static str,
    expected: &'static str,
    arg: Option<&'a str>,
) -> Result<&'a str, CommandError> {
    arg.ok_or(CommandError::MissingArgument { command, expected })
}

fn number<T: std::str::FromStr>(
    command: &'static str,
    expected: &'static str,
    arg: Option<&str>,
) -> Result<T, CommandError> {
    let value = required(command, expected, arg)?;
    value.parse().map_err(|_| CommandError::InvalidValue {
        command,
        value: value.to_string(),
    })
}

fn position(command: &'static str, arg: Option<&str>) -> Result<usize, CommandError> {
    let n: usize = number(command, "a conversation number", arg)?;
    if n == 0 {
        return Err(CommandError::InvalidValue {
            command,
            value: n.to_string(),
        });
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_sent() {
        assert_eq!(
            parse("  Hello there ").unwrap(),
            Some(ReplCommand::Say("Hello there".into()))
        );
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn test_commands_with_arguments() {
        assert_eq!(parse("/select 2").unwrap(), Some(ReplCommand::Select(2)));
        assert_eq!(parse("/delete").unwrap(), Some(ReplCommand::Delete(None)));
        assert_eq!(parse("/rm 3").unwrap(), Some(ReplCommand::Delete(Some(3))));
        assert_eq!(
            parse("/model qwen/qwen3-32b").unwrap(),
            Some(ReplCommand::Model("qwen/qwen3-32b".into()))
        );
        assert_eq!(parse("/temp 0.3").unwrap(), Some(ReplCommand::Temperature(0.3)));
        assert_eq!(parse("/max-tokens 512").unwrap(), Some(ReplCommand::MaxTokens(512)));
        assert_eq!(
            parse("/name  Ada Lovelace ").unwrap(),
            Some(ReplCommand::Name(Some("Ada Lovelace".into())))
        );
        assert_eq!(parse("/name").unwrap(), Some(ReplCommand::Name(None)));
    }

    #[test]
    fn test_bad_input() {
        assert_eq!(
            parse("/frobnicate"),
            Err(CommandError::Unknown("frobnicate".into()))
        );
        assert!(matches!(
            parse("/open"),
            Err(CommandError::MissingArgument { command: "open", .. })
        ));
        assert!(matches!(
            parse("/temp warm"),
            Err(CommandError::InvalidValue { command: "temp", .. })
        ));
        assert!(matches!(
            parse("/select 0"),
            Err(CommandError::InvalidValue { command: "select", .. })
        ));
    }
}
