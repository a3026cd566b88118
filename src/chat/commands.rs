//! Slash command parsing for the chatsync terminal client.
//!
//! Input that starts with `/` controls the client instead of being sent to
//! the backend as a question.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// List the user's sessions.
    Sessions,

    /// Open a session by id.
    Open(String),

    /// Start a new chat.
    New,

    /// Re-fetch the open session's messages.
    Refresh,

    /// Print the flat history of every question the user asked.
    History,

    /// Remember a bearer token.
    Login(String),

    /// Forget the stored credentials.
    Logout,

    /// Show the connection and store status.
    Status,

    /// Display help information.
    Help,

    /// Exit the client.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a question.
///
/// # Examples
///
/// ```
/// # use chatsync::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/open 64f0c2").is_some());
/// assert!(parse_command("What is Rust?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "sessions" | "ls" => ChatCommand::Sessions,
        "open" => match argument {
            Some(id) => ChatCommand::Open(id.to_string()),
            None => ChatCommand::Invalid("/open requires a session id".to_string()),
        },
        "new" => ChatCommand::New,
        "refresh" => ChatCommand::Refresh,
        "history" => ChatCommand::History,
        "login" => match argument {
            Some(token) => ChatCommand::Login(token.to_string()),
            None => ChatCommand::Invalid("/login requires a token".to_string()),
        },
        "logout" => ChatCommand::Logout,
        "status" => ChatCommand::Status,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

/// Returns the help text for the available commands.
pub fn help_text() -> &'static str {
    r#"Commands:
  /sessions         List your chat sessions
  /open <id>        Open a session and show its messages
  /new              Start a new chat
  /refresh          Reload the open session from the server
  /history          Show every question you have asked
  /login <token>    Sign in with a bearer token
  /logout           Forget the stored token
  /status           Show the current session and connection
  /help             Show this help message
  /quit             Exit the client

Anything else is sent as a question."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /QUIT  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_session_commands() {
        assert_eq!(parse_command("/sessions"), Some(ChatCommand::Sessions));
        assert_eq!(parse_command("/ls"), Some(ChatCommand::Sessions));
        assert_eq!(parse_command("/new"), Some(ChatCommand::New));
        assert_eq!(parse_command("/refresh"), Some(ChatCommand::Refresh));
        assert_eq!(parse_command("/history"), Some(ChatCommand::History));
        assert_eq!(
            parse_command("/open  s1 "),
            Some(ChatCommand::Open("s1".to_string()))
        );
        assert!(matches!(
            parse_command("/open"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
    }

    #[test]
    fn parse_credential_commands() {
        assert_eq!(
            parse_command("/login abc.def"),
            Some(ChatCommand::Login("abc.def".to_string()))
        );
        assert_eq!(parse_command("/logout"), Some(ChatCommand::Logout));
        assert!(matches!(
            parse_command("/login   "),
            Some(ChatCommand::Invalid(msg)) if msg.contains("token")
        ));
    }

    #[test]
    fn parse_help_and_status() {
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/status"), Some(ChatCommand::Status));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/frobnicate"),
            Some(ChatCommand::Invalid("Unknown command: /frobnicate".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
        assert_eq!(parse_command("what does a/b mean?"), None);
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/open"));
        assert!(help.contains("/login"));
    }
}
