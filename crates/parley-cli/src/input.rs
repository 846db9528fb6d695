//! Parsing of stdin lines into user input.

use parley_app::UserInput;
use parley_proto::PeerId;

/// A line that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl std::fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown command: {}", self.0)
    }
}

impl std::error::Error for UnknownCommand {}

/// Parse one line of user input.
///
/// Lines starting with `/` are commands; everything else is message text,
/// passed through untrimmed. Blank lines are still sent as text: the client
/// decides what to do with them.
pub fn parse_line(line: &str) -> Result<UserInput, UnknownCommand> {
    let Some(command) = line.trim_start().strip_prefix('/') else {
        return Ok(UserInput::Send(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let argument = parts.next();

    match (name, argument) {
        ("select" | "s", Some(peer)) => Ok(UserInput::SelectPeer(PeerId::new(peer))),
        ("unread" | "u", Some(peer)) => Ok(UserInput::LoadUnread(PeerId::new(peer))),
        ("quit" | "q", None) => Ok(UserInput::Quit),
        _ => Err(UnknownCommand(line.trim().to_string())),
    }
}
