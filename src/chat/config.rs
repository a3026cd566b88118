//! Configuration types for the chatsync terminal client.
//!
//! This module provides CLI argument parsing via `arrrg` and resolves the
//! arguments against the config file and environment.

use arrrg_derive::CommandLine;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::sync::ChatRoute;
use crate::types::SessionId;

/// File name used for stored credentials when `--credentials` is absent.
const DEFAULT_CREDENTIALS_FILE: &str = ".chatsync-credentials.json";

/// Command-line arguments for the chatsync tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the chat backend.
    #[arrrg(optional, "Backend base URL (default: http://localhost:5000)", "URL")]
    pub api_url: Option<String>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Where credentials are kept.
    #[arrrg(optional, "Credentials file (default: ~/.chatsync-credentials.json)", "PATH")]
    pub credentials: Option<String>,

    /// Bearer token to store before starting.
    #[arrrg(optional, "Sign in with this bearer token", "TOKEN")]
    pub token: Option<String>,

    /// Session to open on start.
    #[arrrg(optional, "Open this session on start", "ID")]
    pub session: Option<String>,

    /// Start in a fresh chat.
    #[arrrg(flag, "Start a new chat instead of the most recent session")]
    pub new: bool,

    /// YAML config file.
    #[arrrg(optional, "YAML config file", "PATH")]
    pub config: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Resolved configuration for the terminal client.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Transport configuration.
    pub client: ClientConfig,

    /// Path of the credentials file.
    pub credentials_path: String,

    /// Token to store before the first request, if given.
    pub token: Option<String>,

    /// The chat view to enter on start.
    pub initial_route: ChatRoute,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            client: ClientConfig::new(),
            credentials_path: default_credentials_path(),
            token: None,
            initial_route: ChatRoute::Default,
            use_color: true,
        }
    }

    /// Resolves command-line arguments.
    ///
    /// The client config comes from `--config` if given, otherwise from the
    /// environment; `--api-url` and `--timeout-secs` override either.
    pub fn from_args(args: ChatArgs) -> Result<Self> {
        let client = match &args.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::from_env()?,
        };
        Self::with_client(client, args)
    }

    /// Applies `args` on top of an already loaded client config.
    pub fn with_client(mut client: ClientConfig, args: ChatArgs) -> Result<Self> {
        if let Some(url) = args.api_url {
            client = client.with_base_url(url);
        }
        if let Some(secs) = args.timeout_secs {
            client.timeout_secs = secs;
        }
        client.validate()?;

        let initial_route = if args.new {
            ChatRoute::NewChat
        } else if let Some(id) = args.session {
            ChatRoute::Session(SessionId::from(id))
        } else {
            ChatRoute::Default
        };

        Ok(Self {
            client,
            credentials_path: args.credentials.unwrap_or_else(default_credentials_path),
            token: args.token,
            initial_route,
            use_color: !args.no_color,
        })
    }

    /// Disables colored output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_credentials_path() -> String {
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => format!("{home}/{DEFAULT_CREDENTIALS_FILE}"),
        _ => DEFAULT_CREDENTIALS_FILE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.client.base_url, "http://localhost:5000");
        assert_eq!(config.client.timeout_secs, 60);
        assert!(config.credentials_path.ends_with(DEFAULT_CREDENTIALS_FILE));
        assert!(config.token.is_none());
        assert_eq!(config.initial_route, ChatRoute::Default);
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::with_client(ClientConfig::new(), ChatArgs::default()).unwrap();
        assert_eq!(config.client.base_url, "http://localhost:5000");
        assert_eq!(config.initial_route, ChatRoute::Default);
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            api_url: Some("https://chat.example.com/".to_string()),
            timeout_secs: Some(5),
            credentials: Some("/tmp/creds.json".to_string()),
            token: Some("tok".to_string()),
            session: Some("s1".to_string()),
            new: false,
            config: None,
            no_color: true,
        };
        let config = ChatConfig::with_client(ClientConfig::new(), args).unwrap();
        assert_eq!(config.client.base_url, "https://chat.example.com");
        assert_eq!(config.client.timeout_secs, 5);
        assert_eq!(config.credentials_path, "/tmp/creds.json");
        assert_eq!(config.token.as_deref(), Some("tok"));
        assert_eq!(
            config.initial_route,
            ChatRoute::Session(SessionId::from("s1"))
        );
        assert!(!config.use_color);
    }

    #[test]
    fn new_flag_wins_over_session() {
        let args = ChatArgs {
            session: Some("s1".to_string()),
            new: true,
            ..ChatArgs::default()
        };
        let config = ChatConfig::with_client(ClientConfig::new(), args).unwrap();
        assert_eq!(config.initial_route, ChatRoute::NewChat);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let args = ChatArgs {
            timeout_secs: Some(0),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::with_client(ClientConfig::new(), args).is_err());
    }
}
