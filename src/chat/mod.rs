//! Interactive terminal client built on [`ChatSync`](crate::ChatSync).
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: slash command parsing
//! - [`render`]: transcript and session-list output
//! - [`navigator`]: route tracking for a terminal

mod commands;
mod config;
mod navigator;
mod render;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use navigator::{CHAT_ROUTE, TerminalNavigator};
pub use render::{PlainTextRenderer, Renderer};
