//! Session and message state.
//!
//! [`ChatState`] is a plain value updated only through [`ChatState::apply`].
//! [`Store`] wraps one instance for sharing: the synchronization layer
//! writes through [`Store::dispatch_all`], which applies a batch of events
//! under a single lock and publishes a single change notification, so
//! readers never observe half of a resolved operation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use time::OffsetDateTime;
use tokio::sync::watch;

use crate::observability::STORE_DISPATCHES;
use crate::types::{
    ChatEntry, ChatMessage, ClientTempId, MessageId, PendingMessage, SessionId, SessionSummary,
};

/// Which kind of network operation an event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Listing sessions.
    Sessions,
    /// Fetching one session's messages.
    Messages(SessionId),
    /// Sending the pending message with this id.
    Send(ClientTempId),
}

/// Everything that can change [`ChatState`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// Replace the session list.
    SessionsLoaded(Vec<SessionSummary>),
    /// Install a session's history and make it the active session.
    SessionMessagesLoaded {
        /// The session fetched.
        session_id: SessionId,
        /// Its messages, oldest first.
        messages: Vec<ChatMessage>,
    },
    /// Install a session's history without touching the active session.
    SessionMessagesCached {
        /// The session fetched.
        session_id: SessionId,
        /// Its messages, oldest first.
        messages: Vec<ChatMessage>,
    },
    /// Append a confirmed message, at most once per message id.
    MessageAppended {
        /// The session the message belongs to.
        session_id: SessionId,
        /// The confirmed message.
        message: ChatMessage,
        /// The pending entry this message confirms, if any.
        resolves: Option<ClientTempId>,
    },
    /// Prepend a session summary unless its id is already listed.
    SessionAdded(SessionSummary),
    /// Point at a session, or at none.
    SessionPointerSet(Option<SessionId>),
    /// Drop one session's cached messages, or every session's.
    MessagesCleared(Option<SessionId>),
    /// Record the first phase of a send.
    MessagePending(PendingMessage),
    /// A network operation began.
    RequestStarted(Request),
    /// A network operation succeeded.
    RequestFinished(Request),
    /// A network operation failed with this normalized message.
    RequestFailed {
        /// The operation.
        request: Request,
        /// Message for the error slot.
        error: String,
    },
    /// Forget every session, message and pending send of the signed-out
    /// account.  In-flight counters and the error slot are kept.
    SignedOut,
    /// Put a failure that involved no request into the error slot.
    ErrorRaised(String),
    /// Clear the error slot.
    ErrorDismissed,
}

/// In-flight operation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingState {
    /// Session list fetches in flight.
    pub sessions: u32,
    /// Message history fetches in flight.
    pub messages: u32,
    /// Sends in flight.
    pub sends: u32,
}

impl LoadingState {
    /// True if anything is in flight.
    pub fn any(&self) -> bool {
        self.sessions + self.messages + self.sends > 0
    }

    fn counter(&mut self, request: &Request) -> &mut u32 {
        match request {
            Request::Sessions => &mut self.sessions,
            Request::Messages(_) => &mut self.messages,
            Request::Send(_) => &mut self.sends,
        }
    }
}

/// Client-side mirror of the user's chat sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    /// Confirmed messages per session, in insertion order.
    pub messages_by_session: HashMap<SessionId, Vec<ChatMessage>>,
    /// Session summaries, most recent first.
    pub sessions: Vec<SessionSummary>,
    /// True once a session list has been loaded.
    pub sessions_loaded: bool,
    /// The active session.
    pub current_session_id: Option<SessionId>,
    /// Sends awaiting confirmation, oldest first.
    pub pending: Vec<PendingMessage>,
    /// In-flight operations.
    pub loading: LoadingState,
    /// The last normalized error, until dismissed or superseded.
    pub error: Option<String>,
    next_temp_id: u64,
    navigation: u64,
    account: u64,
}

impl ChatState {
    /// Apply one event.
    pub fn apply(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::SessionsLoaded(sessions) => {
                self.sessions = sessions;
                self.sessions_loaded = true;
            }
            ChatEvent::SessionMessagesLoaded {
                session_id,
                messages,
            } => {
                self.messages_by_session.insert(session_id.clone(), messages);
                self.current_session_id = Some(session_id);
                self.navigation += 1;
            }
            ChatEvent::SessionMessagesCached {
                session_id,
                messages,
            } => {
                self.messages_by_session.insert(session_id, messages);
            }
            ChatEvent::MessageAppended {
                session_id,
                message,
                resolves,
            } => {
                if let Some(temp_id) = resolves {
                    self.pending.retain(|p| p.temp_id != temp_id);
                }
                let list = self.messages_by_session.entry(session_id).or_default();
                if !list.iter().any(|m| m.id == message.id) {
                    list.push(message);
                }
            }
            ChatEvent::SessionAdded(summary) => {
                if !self.sessions.iter().any(|s| s.id == summary.id) {
                    self.sessions.insert(0, summary);
                }
            }
            ChatEvent::SessionPointerSet(session_id) => {
                self.current_session_id = session_id;
                self.navigation += 1;
            }
            ChatEvent::MessagesCleared(Some(session_id)) => {
                self.messages_by_session.remove(&session_id);
            }
            ChatEvent::MessagesCleared(None) => {
                self.messages_by_session.clear();
            }
            ChatEvent::MessagePending(pending) => {
                self.next_temp_id = self.next_temp_id.max(pending.temp_id.0 + 1);
                self.pending.push(pending);
            }
            ChatEvent::RequestStarted(request) => {
                *self.loading.counter(&request) += 1;
                self.error = None;
            }
            ChatEvent::RequestFinished(request) => {
                let counter = self.loading.counter(&request);
                *counter = counter.saturating_sub(1);
            }
            ChatEvent::RequestFailed { request, error } => {
                if let Request::Send(temp_id) = &request {
                    self.pending.retain(|p| p.temp_id != *temp_id);
                }
                let counter = self.loading.counter(&request);
                *counter = counter.saturating_sub(1);
                self.error = Some(error);
            }
            ChatEvent::SignedOut => {
                self.sessions.clear();
                self.sessions_loaded = false;
                self.messages_by_session.clear();
                self.pending.clear();
                self.current_session_id = None;
                self.navigation += 1;
                self.account += 1;
            }
            ChatEvent::ErrorRaised(error) => {
                self.error = Some(error);
            }
            ChatEvent::ErrorDismissed => {
                self.error = None;
            }
        }
    }

    /// Bumped whenever the active session is set, even to the same value.
    ///
    /// A fetch that sees this change while in flight knows the user moved.
    pub fn navigation_generation(&self) -> u64 {
        self.navigation
    }

    /// Bumped on every sign-out.  Results fetched for an earlier account
    /// must not be committed.
    pub fn account_generation(&self) -> u64 {
        self.account
    }

    /// Confirmed messages of `session_id`; empty if none are cached.
    pub fn messages(&self, session_id: &SessionId) -> &[ChatMessage] {
        self.messages_by_session
            .get(session_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True if a non-empty history for `session_id` is cached.
    pub fn has_cached_messages(&self, session_id: &SessionId) -> bool {
        !self.messages(session_id).is_empty()
    }

    /// True if `message_id` is among the confirmed messages of `session_id`.
    pub fn contains_message(&self, session_id: &SessionId, message_id: &MessageId) -> bool {
        self.messages(session_id).iter().any(|m| &m.id == message_id)
    }

    /// The summary for `session_id`, if listed.
    pub fn session(&self, session_id: &SessionId) -> Option<&SessionSummary> {
        self.sessions.iter().find(|s| &s.id == session_id)
    }

    /// Confirmed messages followed by pending sends for one session.
    ///
    /// `None` is the not-yet-created session of a fresh chat, which can only
    /// hold pending entries.
    pub fn transcript(&self, session_id: Option<&SessionId>) -> Vec<ChatEntry> {
        let confirmed = session_id
            .map(|id| self.messages(id))
            .unwrap_or(&[])
            .iter()
            .cloned()
            .map(ChatEntry::Confirmed);
        let pending = self
            .pending
            .iter()
            .filter(|p| p.session_id.as_ref() == session_id)
            .cloned()
            .map(ChatEntry::Pending);
        confirmed.chain(pending).collect()
    }

    /// Transcript of the active session.
    pub fn current_transcript(&self) -> Vec<ChatEntry> {
        self.transcript(self.current_session_id.as_ref())
    }

    /// Build a pending message with a fresh temporary id.
    ///
    /// The id is reserved only once the returned message is dispatched as
    /// [`ChatEvent::MessagePending`].
    pub fn prepare_pending(
        &self,
        session_id: Option<SessionId>,
        question: impl Into<String>,
        now: OffsetDateTime,
    ) -> PendingMessage {
        PendingMessage {
            temp_id: ClientTempId(self.next_temp_id),
            session_id,
            question: question.into(),
            created_at: now,
        }
    }
}

/// A shareable, subscribable handle to one [`ChatState`].
///
/// Cloning the handle shares the state.  Each `Store::new` is independent.
#[derive(Clone)]
pub struct Store {
    state: Arc<Mutex<ChatState>>,
    changes: Arc<watch::Sender<u64>>,
}

impl Store {
    /// A store holding the empty state.
    pub fn new() -> Self {
        Self::with_state(ChatState::default())
    }

    /// A store seeded with `state`.
    pub fn with_state(state: ChatState) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(state)),
            changes: Arc::new(changes),
        }
    }

    /// Apply one event.
    pub fn dispatch(&self, event: ChatEvent) {
        self.dispatch_all([event]);
    }

    /// Apply a batch of events atomically and notify subscribers once.
    pub fn dispatch_all(&self, events: impl IntoIterator<Item = ChatEvent>) {
        {
            let mut state = self.lock();
            for event in events {
                STORE_DISPATCHES.click();
                state.apply(event);
            }
        }
        self.changes.send_modify(|version| *version += 1);
    }

    /// Reserve a temporary id and record a pending send in one step.
    pub fn begin_send(
        &self,
        session_id: Option<SessionId>,
        question: &str,
        now: OffsetDateTime,
    ) -> PendingMessage {
        let pending = {
            let mut state = self.lock();
            let pending = state.prepare_pending(session_id, question, now);
            STORE_DISPATCHES.click();
            state.apply(ChatEvent::MessagePending(pending.clone()));
            STORE_DISPATCHES.click();
            state.apply(ChatEvent::RequestStarted(Request::Send(pending.temp_id)));
            pending
        };
        self.changes.send_modify(|version| *version += 1);
        pending
    }

    /// Read the state under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&ChatState) -> R) -> R {
        f(&self.lock())
    }

    /// A copy of the whole state.
    pub fn snapshot(&self) -> ChatState {
        self.lock().clone()
    }

    /// Receive the state version after every dispatch.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Confirmed messages of `session_id`.
    pub fn messages(&self, session_id: &SessionId) -> Vec<ChatMessage> {
        self.read(|s| s.messages(session_id).to_vec())
    }

    /// Session summaries, most recent first.
    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.read(|s| s.sessions.clone())
    }

    /// The active session.
    pub fn current_session_id(&self) -> Option<SessionId> {
        self.read(|s| s.current_session_id.clone())
    }

    /// The transcript of the active session.
    pub fn current_transcript(&self) -> Vec<ChatEntry> {
        self.read(ChatState::current_transcript)
    }

    /// True if any network operation is in flight.
    pub fn is_loading(&self) -> bool {
        self.read(|s| s.loading.any())
    }

    /// The error slot.
    pub fn error(&self) -> Option<String> {
        self.read(|s| s.error.clone())
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("state", &*self.lock()).finish()
    }
}
