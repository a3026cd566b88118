//! The contract between chatsync and whatever hosts it.
//!
//! The host owns routing.  chatsync only asks it which route is showing, to
//! move to another route, and to reflect the active session without a full
//! reload.

use std::sync::Arc;

use crate::client::UnauthorizedHandler;
use crate::config::ClientConfig;
use crate::store::{ChatEvent, Store};
use crate::types::SessionId;

/// Navigation services supplied by the hosting application.
pub trait Navigator: Send + Sync {
    /// The route currently showing, e.g. `/chat`.
    fn current_route(&self) -> String;

    /// Move to `route`.
    fn redirect(&self, route: &str);

    /// Reflect the active session into the navigational context.
    ///
    /// This is a shallow replace: no reload, no history entry.
    fn replace_session(&self, session_id: Option<&SessionId>);
}

/// Sends the user to the login route when the backend rejects them.
///
/// No redirect happens while a public route (login, signup) is showing, so
/// a 401 from a request issued on the login page cannot loop.  With a store
/// attached, the signed-out account's sessions are forgotten on every 401.
pub struct LoginRedirect {
    navigator: Arc<dyn Navigator>,
    login_route: String,
    public_routes: Vec<String>,
    store: Option<Store>,
}

impl LoginRedirect {
    /// Redirect through `navigator` using the routes in `config`.
    pub fn new(navigator: Arc<dyn Navigator>, config: &ClientConfig) -> Self {
        Self {
            navigator,
            login_route: config.login_route.clone(),
            public_routes: config.public_routes.clone(),
            store: None,
        }
    }

    /// Also reset `store` whenever the backend rejects the token.
    pub fn resetting(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }
}

impl UnauthorizedHandler for LoginRedirect {
    fn on_unauthorized(&self) {
        if let Some(store) = &self.store {
            store.dispatch(ChatEvent::SignedOut);
        }
        let current = self.navigator.current_route();
        if !self.public_routes.iter().any(|r| *r == current) {
            self.navigator.redirect(&self.login_route);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// A navigator that records what it was asked to do.
    #[derive(Default)]
    pub struct RecordingNavigator {
        pub route: Mutex<String>,
        pub redirects: Mutex<Vec<String>>,
        pub replaced: Mutex<Vec<Option<SessionId>>>,
    }

    impl RecordingNavigator {
        pub fn at(route: &str) -> Self {
            Self {
                route: Mutex::new(route.to_string()),
                ..Self::default()
            }
        }

        pub fn redirects(&self) -> Vec<String> {
            self.redirects.lock().unwrap().clone()
        }

        pub fn replaced(&self) -> Vec<Option<SessionId>> {
            self.replaced.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn current_route(&self) -> String {
            self.route.lock().unwrap().clone()
        }

        fn redirect(&self, route: &str) {
            *self.route.lock().unwrap() = route.to_string();
            self.redirects.lock().unwrap().push(route.to_string());
        }

        fn replace_session(&self, session_id: Option<&SessionId>) {
            self.replaced.lock().unwrap().push(session_id.cloned());
        }
    }
}
