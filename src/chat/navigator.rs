//! A [`Navigator`] for a terminal, where the "route" is just a string.

use std::sync::Mutex;

use crate::navigation::Navigator;
use crate::types::SessionId;

/// Route shown while chatting.
pub const CHAT_ROUTE: &str = "/chat";

/// Tracks the route the terminal client is "on".
///
/// Opening a session moves to `/chat/<id>`; a fresh chat is `/chat`.  A
/// redirect to the login route is remembered so the REPL can prompt for
/// `/login`.
#[derive(Debug)]
pub struct TerminalNavigator {
    route: Mutex<String>,
}

impl TerminalNavigator {
    /// Starts on `/chat`.
    pub fn new() -> Self {
        Self::at(CHAT_ROUTE)
    }

    /// Starts on `route`.
    pub fn at(route: impl Into<String>) -> Self {
        Self {
            route: Mutex::new(route.into()),
        }
    }

    /// True unless the last redirect left the chat view.
    pub fn in_chat(&self) -> bool {
        self.current_route().starts_with(CHAT_ROUTE)
    }

    fn set(&self, route: String) {
        *self.route.lock().unwrap_or_else(|p| p.into_inner()) = route;
    }
}

impl Default for TerminalNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for TerminalNavigator {
    fn current_route(&self) -> String {
        self.route.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn redirect(&self, route: &str) {
        self.set(route.to_string());
    }

    fn replace_session(&self, session_id: Option<&SessionId>) {
        match session_id {
            Some(id) => self.set(format!("{CHAT_ROUTE}/{id}")),
            None => self.set(CHAT_ROUTE.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_session_and_redirects() {
        let nav = TerminalNavigator::new();
        assert_eq!(nav.current_route(), "/chat");
        nav.replace_session(Some(&SessionId::from("s1")));
        assert_eq!(nav.current_route(), "/chat/s1");
        assert!(nav.in_chat());
        nav.redirect("/login");
        assert!(!nav.in_chat());
        nav.replace_session(None);
        assert_eq!(nav.current_route(), "/chat");
    }
}
