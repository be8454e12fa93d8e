use anyhow::{anyhow, bail, Result};
use std::time::Duration;

use crate::models::StartRequest;

/// Operator commands read from the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start(StartRequest),
    Stop,
    Reset,
    Status,
    History,
    Chime(bool),
    Help,
    Quit,
}

pub const HELP: &str = "commands: explore | arcade [seconds] | stop | reset | status | history | chime on|off | quit";

/// Parse one console line. `arcade` without a number uses `default_arcade_secs`.
pub fn parse_command(line: &str, default_arcade_secs: u64) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    if let Some(extra) = words.next() {
        bail!("unexpected argument '{extra}'");
    }

    let command = match (head.to_ascii_lowercase().as_str(), arg) {
        ("explore" | "e", None) => ConsoleCommand::Start(StartRequest::explore()),
        ("arcade" | "a", secs) => {
            let secs = match secs {
                Some(raw) => raw
                    .parse::<u64>()
                    .map_err(|_| anyhow!("arcade duration must be whole seconds, got '{raw}'"))?,
                None => default_arcade_secs,
            };
            ConsoleCommand::Start(StartRequest::arcade(Duration::from_secs(secs)))
        }
        ("stop" | "back", None) => ConsoleCommand::Stop,
        ("reset" | "ok", None) => ConsoleCommand::Reset,
        ("status", None) => ConsoleCommand::Status,
        ("history", None) => ConsoleCommand::History,
        ("chime", Some("on")) => ConsoleCommand::Chime(true),
        ("chime", Some("off")) => ConsoleCommand::Chime(false),
        ("chime", _) => bail!("usage: chime on|off"),
        ("help" | "?", None) => ConsoleCommand::Help,
        ("quit" | "exit" | "q", None) => ConsoleCommand::Quit,
        (other, Some(arg)) if is_known(other) => bail!("'{other}' takes no argument (got '{arg}')"),
        (other, _) => bail!("unknown command '{other}'"),
    };

    Ok(Some(command))
}

fn is_known(word: &str) -> bool {
    matches!(
        word,
        "explore" | "e" | "stop" | "back" | "reset" | "ok" | "status" | "history" | "help" | "?"
            | "quit" | "exit" | "q"
    )
}
