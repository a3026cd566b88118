//! Synchronization between the [`Store`] and a [`ChatBackend`].
//!
//! [`ChatSync`] is the only component that talks to the network.  Each
//! operation records that it started, awaits the backend, and commits the
//! outcome to the store in one atomic batch.  Failures are normalized into the
//! store's error slot and also returned to the caller; the store stays usable
//! after any of them.

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::client::{ChatBackend, validate_question};
use crate::error::Result;
use crate::navigation::Navigator;
use crate::observability::{SYNC_CACHE_HITS, SYNC_SESSIONS_CREATED, SYNC_STALE_LOADS};
use crate::store::{ChatEvent, ChatState, Request, Store};
use crate::types::{ChatMessage, SessionId, SessionSummary};

/// How the chat view was entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRoute {
    /// A specific session was requested.
    Session(SessionId),
    /// The user asked for a fresh chat.
    NewChat,
    /// No session in the navigational context.
    Default,
}

/// What a successful send produced.
#[derive(Debug)]
pub struct SendOutcome {
    /// The confirmed message.
    pub message: ChatMessage,
    /// True if the answer came from a session other than the one active
    /// when the send began, normally one the backend just created.
    pub created_session: bool,
    /// The background session-list reconciliation, when one was started.
    pub reconcile: Option<JoinHandle<()>>,
}

/// Coordinates network calls and commits their results to a [`Store`].
pub struct ChatSync<B: ChatBackend> {
    backend: Arc<B>,
    store: Store,
    navigator: Option<Arc<dyn Navigator>>,
}

impl<B: ChatBackend> Clone for ChatSync<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            store: self.store.clone(),
            navigator: self.navigator.clone(),
        }
    }
}

impl<B: ChatBackend> ChatSync<B> {
    /// Synchronize `store` against `backend`.
    pub fn new(backend: Arc<B>, store: Store) -> Self {
        Self {
            backend,
            store,
            navigator: None,
        }
    }

    /// Reflect session changes into `navigator`.
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// The store this orchestrator writes to.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The backend this orchestrator reads from.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Replace the session list with the server's.
    ///
    /// On failure the existing list is left as it was.
    pub async fn load_sessions(&self) -> Result<Vec<SessionSummary>> {
        let account = self.store.read(ChatState::account_generation);
        self.store.dispatch(ChatEvent::RequestStarted(Request::Sessions));
        match self.backend.list_sessions().await {
            Ok(sessions) => {
                if self.store.read(ChatState::account_generation) != account {
                    SYNC_STALE_LOADS.click();
                    self.store
                        .dispatch(ChatEvent::RequestFinished(Request::Sessions));
                    return Ok(sessions);
                }
                self.store.dispatch_all([
                    ChatEvent::SessionsLoaded(sessions.clone()),
                    ChatEvent::RequestFinished(Request::Sessions),
                ]);
                Ok(sessions)
            }
            Err(err) => {
                self.store.dispatch(ChatEvent::RequestFailed {
                    request: Request::Sessions,
                    error: err.user_message(),
                });
                Err(err)
            }
        }
    }

    /// Make `session_id` the active session, fetching its history unless a
    /// non-empty copy is already cached.
    ///
    /// If the user navigated elsewhere while the fetch was in flight, the
    /// history is cached but the pointer is left alone.  If the user signed
    /// out meanwhile, the history is dropped.
    pub async fn load_session_messages(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>> {
        let (cached, navigation, account) = self.store.read(|s| {
            (
                s.has_cached_messages(session_id)
                    .then(|| s.messages(session_id).to_vec()),
                s.navigation_generation(),
                s.account_generation(),
            )
        });
        if let Some(messages) = cached {
            SYNC_CACHE_HITS.click();
            self.store
                .dispatch(ChatEvent::SessionPointerSet(Some(session_id.clone())));
            return Ok(messages);
        }

        let request = Request::Messages(session_id.clone());
        self.store.dispatch(ChatEvent::RequestStarted(request.clone()));
        match self.backend.session_messages(session_id).await {
            Ok(messages) => {
                let (pointer_now, navigation_now, account_now) = self.store.read(|s| {
                    (
                        s.current_session_id.clone(),
                        s.navigation_generation(),
                        s.account_generation(),
                    )
                });
                if account_now != account {
                    SYNC_STALE_LOADS.click();
                    self.store.dispatch(ChatEvent::RequestFinished(request));
                    return Ok(messages);
                }
                let navigated_away =
                    navigation_now != navigation && pointer_now.as_ref() != Some(session_id);
                let install = if navigated_away {
                    SYNC_STALE_LOADS.click();
                    ChatEvent::SessionMessagesCached {
                        session_id: session_id.clone(),
                        messages: messages.clone(),
                    }
                } else {
                    ChatEvent::SessionMessagesLoaded {
                        session_id: session_id.clone(),
                        messages: messages.clone(),
                    }
                };
                self.store
                    .dispatch_all([install, ChatEvent::RequestFinished(request)]);
                Ok(messages)
            }
            Err(err) => {
                self.store.dispatch(ChatEvent::RequestFailed {
                    request,
                    error: err.user_message(),
                });
                Err(err)
            }
        }
    }

    /// Drop the cached history of `session_id` and fetch it again.
    pub async fn refresh_session_messages(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ChatMessage>> {
        self.store
            .dispatch(ChatEvent::MessagesCleared(Some(session_id.clone())));
        self.load_session_messages(session_id).await
    }

    /// Ask `question` in `session_id`, or in a new session when `None`.
    ///
    /// The question is shown as a pending entry until the backend answers.
    /// If the answer belongs to a session other than the one active when the
    /// send began, that session becomes active, a provisional summary is
    /// listed unless it already is, and the session list is reloaded in the
    /// background.
    pub async fn send_message(
        &self,
        question: &str,
        session_id: Option<SessionId>,
    ) -> Result<SendOutcome> {
        let question = match validate_question(question) {
            Ok(question) => question,
            Err(err) => {
                self.store.dispatch(ChatEvent::ErrorRaised(err.user_message()));
                return Err(err);
            }
        };
        let (pointer_before, account) = self
            .store
            .read(|s| (s.current_session_id.clone(), s.account_generation()));
        let pending = self
            .store
            .begin_send(session_id.clone(), question, OffsetDateTime::now_utc());
        let request = Request::Send(pending.temp_id);

        let message = match self
            .backend
            .send_message(question, session_id.as_ref())
            .await
        {
            Ok(message) => message,
            Err(err) => {
                self.store.dispatch(ChatEvent::RequestFailed {
                    request,
                    error: err.user_message(),
                });
                return Err(err);
            }
        };

        if self.store.read(ChatState::account_generation) != account {
            SYNC_STALE_LOADS.click();
            self.store.dispatch(ChatEvent::RequestFinished(request));
            return Ok(SendOutcome {
                message,
                created_session: false,
                reconcile: None,
            });
        }

        let created_session = pointer_before.as_ref() != Some(&message.session_id);
        let mut events = Vec::with_capacity(4);
        if created_session {
            events.push(ChatEvent::SessionPointerSet(Some(
                message.session_id.clone(),
            )));
            events.push(ChatEvent::SessionAdded(SessionSummary::provisional(
                message.session_id.clone(),
                question,
                OffsetDateTime::now_utc(),
            )));
        }
        events.push(ChatEvent::MessageAppended {
            session_id: message.session_id.clone(),
            message: message.clone(),
            resolves: Some(pending.temp_id),
        });
        events.push(ChatEvent::RequestFinished(request));
        self.store.dispatch_all(events);

        let reconcile = if created_session {
            SYNC_SESSIONS_CREATED.click();
            if let Some(navigator) = &self.navigator {
                navigator.replace_session(Some(&message.session_id));
            }
            let this = self.clone();
            Some(tokio::spawn(async move {
                // Failures land in the store's error slot.
                let _ = this.load_sessions().await;
            }))
        } else {
            None
        };

        Ok(SendOutcome {
            message,
            created_session,
            reconcile,
        })
    }

    /// Resolve which session the chat view shows on entry.
    ///
    /// Returns the active session afterwards.
    pub async fn enter_chat(&self, route: ChatRoute) -> Result<Option<SessionId>> {
        match route {
            ChatRoute::Session(session_id) => {
                self.load_session_messages(&session_id).await?;
                Ok(Some(session_id))
            }
            ChatRoute::NewChat => {
                self.start_new_chat();
                Ok(None)
            }
            ChatRoute::Default => {
                let most_recent = self.store.read(|s| {
                    if s.sessions_loaded {
                        s.sessions.first().map(|summary| summary.id.clone())
                    } else {
                        None
                    }
                });
                match most_recent {
                    Some(session_id) => {
                        self.load_session_messages(&session_id).await?;
                        if let Some(navigator) = &self.navigator {
                            navigator.replace_session(Some(&session_id));
                        }
                        Ok(Some(session_id))
                    }
                    None => Ok(self.store.current_session_id()),
                }
            }
        }
    }

    /// Leave the active session so the next send starts a new one.
    pub fn start_new_chat(&self) {
        self.store.dispatch(ChatEvent::SessionPointerSet(None));
        if let Some(navigator) = &self.navigator {
            navigator.replace_session(None);
        }
    }

    /// Forget everything cached for the signed-out account.
    ///
    /// Results of requests still in flight are discarded when they land.
    pub fn sign_out(&self) {
        self.store.dispatch(ChatEvent::SignedOut);
    }

    /// Clear the error slot.
    pub fn dismiss_error(&self) {
        self.store.dispatch(ChatEvent::ErrorDismissed);
    }
}
