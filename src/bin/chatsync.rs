//! Interactive terminal client for the chat backend.
//!
//! # Usage
//!
//! ```bash
//! # Sign in and open the most recent session
//! chatsync --token "$CHAT_TOKEN"
//!
//! # Talk to a different backend
//! chatsync --api-url https://chat.example.com
//!
//! # Reopen a specific session, or start fresh
//! chatsync --session 64f0c2
//! chatsync --new
//! ```
//!
//! Set `CHATSYNC_LOG=1` to print every request and response status to stderr.

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use chatsync::chat::{
    ChatArgs, ChatCommand, ChatConfig, PlainTextRenderer, Renderer, TerminalNavigator, help_text,
    parse_command,
};
use chatsync::{
    ApiClient, ChatEntry, ChatRoute, ChatSync, ClientLogger, CredentialStore, Credentials,
    FileCredentials, LoginRedirect, Navigator, SessionId, Store,
};

/// Logs each exchange to stderr.
struct StderrLogger;

impl ClientLogger for StderrLogger {
    fn log_request(&self, method: &str, path: &str) {
        eprintln!("-> {method} {path}");
    }

    fn log_response(&self, method: &str, path: &str, status: u16, body: &[u8]) {
        eprintln!("<- {method} {path} {status} ({} bytes)", body.len());
    }
}

/// Main entry point for the chatsync application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("chatsync [OPTIONS]");
    let config = ChatConfig::from_args(args)?;
    let mut renderer = PlainTextRenderer::with_color(config.use_color);

    let credentials = Arc::new(FileCredentials::new(&config.credentials_path));
    if let Some(token) = &config.token {
        credentials.store(Credentials::from_token(token.clone()))?;
    }
    let navigator = Arc::new(TerminalNavigator::new());
    let store = Store::new();

    let mut client = ApiClient::new(&config.client, credentials.clone())?
        .with_unauthorized_handler(Arc::new(
            LoginRedirect::new(navigator.clone(), &config.client).resetting(store.clone()),
        ));
    if std::env::var("CHATSYNC_LOG").is_ok_and(|v| !v.is_empty() && v != "0") {
        client = client.with_logger(Arc::new(StderrLogger));
    }
    let sync = ChatSync::new(Arc::new(client), store).with_navigator(navigator.clone());

    println!("chatsync ({})", config.client.base_url);
    println!("Type /help for commands, /quit to exit\n");

    if credentials.token().is_some() {
        if let Err(err) = sync.load_sessions().await {
            renderer.print_error(&err.user_message());
        }
        match sync.enter_chat(config.initial_route.clone()).await {
            Ok(_) => show_current(&sync, &mut renderer),
            Err(err) => renderer.print_error(&err.user_message()),
        }
    } else {
        renderer.print_info("Not signed in. Use /login <token>.");
    }
    sync.dismiss_error();

    let mut rl = DefaultEditor::new()?;
    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Sessions => match sync.load_sessions().await {
                            Ok(sessions) => {
                                let current = sync.store().current_session_id();
                                renderer.render_sessions(&sessions, current.as_ref());
                            }
                            Err(err) => renderer.print_error(&err.user_message()),
                        },
                        ChatCommand::Open(id) => {
                            let session_id = SessionId::from(id);
                            match sync.enter_chat(ChatRoute::Session(session_id.clone())).await {
                                Ok(_) => {
                                    navigator.replace_session(Some(&session_id));
                                    show_current(&sync, &mut renderer);
                                }
                                Err(err) => renderer.print_error(&err.user_message()),
                            }
                        }
                        ChatCommand::New => {
                            sync.start_new_chat();
                            renderer.print_info("Started a new chat.");
                        }
                        ChatCommand::Refresh => match sync.store().current_session_id() {
                            Some(session_id) => {
                                match sync.refresh_session_messages(&session_id).await {
                                    Ok(_) => show_current(&sync, &mut renderer),
                                    Err(err) => renderer.print_error(&err.user_message()),
                                }
                            }
                            None => renderer.print_info("No session is open."),
                        },
                        ChatCommand::History => match sync.backend().history().await {
                            Ok(items) => renderer.render_history(&items),
                            Err(err) => renderer.print_error(&err.user_message()),
                        },
                        ChatCommand::Login(token) => {
                            match credentials.store(Credentials::from_token(token)) {
                                Ok(()) => {
                                    let current = sync.store().current_session_id();
                                    navigator.replace_session(current.as_ref());
                                    renderer.print_info("Signed in.");
                                    if let Err(err) = sync.load_sessions().await {
                                        renderer.print_error(&err.user_message());
                                    }
                                }
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::Logout => match credentials.clear() {
                            Ok(()) => {
                                sync.sign_out();
                                renderer.print_info("Signed out.");
                            }
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::Status => {
                            print_status(&sync, &config, credentials.as_ref(), navigator.as_ref());
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    sync.dismiss_error();
                    continue;
                }

                let session_id = sync.store().current_session_id();
                match sync.send_message(line, session_id).await {
                    Ok(outcome) => {
                        if outcome.created_session {
                            renderer.print_info(&format!(
                                "(new session {})",
                                outcome.message.session_id
                            ));
                        }
                        println!("{}\n", outcome.message.answer);
                    }
                    Err(err) => renderer.print_error(&err.user_message()),
                }
                sync.dismiss_error();
                if !navigator.in_chat() {
                    renderer.print_info("Your session has expired. Use /login <token>.");
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    Ok(())
}

fn show_current(sync: &ChatSync<ApiClient>, renderer: &mut PlainTextRenderer) {
    let entries: Vec<ChatEntry> = sync.store().current_transcript();
    match sync.store().current_session_id() {
        Some(session_id) => {
            let title = sync.store().read(|s| {
                s.session(&session_id)
                    .map(|summary| summary.display_title().to_string())
            });
            renderer.print_info(&format!(
                "== {} ({}) ==",
                title.as_deref().unwrap_or("Untitled"),
                session_id
            ));
            renderer.render_transcript(&entries);
        }
        None => renderer.print_info("New chat. Ask anything."),
    }
}

fn print_status(
    sync: &ChatSync<ApiClient>,
    config: &ChatConfig,
    credentials: &dyn CredentialStore,
    navigator: &TerminalNavigator,
) {
    let state = sync.store().snapshot();
    println!("Backend:      {}", config.client.base_url);
    println!(
        "Signed in:    {}",
        if credentials.token().is_some() { "yes" } else { "no" }
    );
    println!("Route:        {}", navigator.current_route());
    match &state.current_session_id {
        Some(id) => println!("Session:      {id}"),
        None => println!("Session:      (new chat)"),
    }
    println!("Sessions:     {}", state.sessions.len());
    println!("Cached:       {}", state.messages_by_session.len());
    if let Some(error) = &state.error {
        println!("Last error:   {error}");
    }
}
