use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::types::SessionId;
use crate::validate::identifier;

/// Server-assigned identifier of a persisted message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        identifier(deserializer).map(Self)
    }
}

/// One question/answer exchange confirmed by the server.
///
/// Decodes the `POST /api/chat/message` payload, which names its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique message identifier.
    pub id: MessageId,

    /// The session this exchange belongs to.
    pub session_id: SessionId,

    /// Owner of the message, when the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// What the user asked.
    pub question: String,

    /// What the assistant answered.
    pub answer: String,

    /// Token usage billed for this exchange.
    pub tokens: u64,

    /// When the exchange was persisted.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A message as listed by the history endpoints, which omit the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    /// Unique message identifier.
    pub id: MessageId,

    /// Owner of the message.
    pub user_id: String,

    /// What the user asked.
    pub question: String,

    /// What the assistant answered.
    pub answer: String,

    /// Token usage billed for this exchange.
    pub tokens: u64,

    /// When the exchange was persisted.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl HistoryItem {
    /// Attach the session this item was fetched for.
    pub fn into_message(self, session_id: SessionId) -> ChatMessage {
        ChatMessage {
            id: self.id,
            session_id,
            user_id: Some(self.user_id),
            question: self.question,
            answer: self.answer,
            tokens: self.tokens,
            created_at: self.created_at,
        }
    }
}

/// Client-issued identifier for a message the server has not confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientTempId(pub u64);

impl fmt::Display for ClientTempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pending-{}", self.0)
    }
}

/// The first phase of a send: the question is in flight, no answer yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// Identifier issued by the store.
    pub temp_id: ClientTempId,

    /// The session the question was sent to; `None` starts a new session.
    pub session_id: Option<SessionId>,

    /// What the user asked.
    pub question: String,

    /// When the send was issued.
    pub created_at: OffsetDateTime,
}

/// A transcript line, either still in flight or confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEntry {
    /// Sent, awaiting the server.
    Pending(PendingMessage),
    /// Persisted by the server.
    Confirmed(ChatMessage),
}

impl ChatEntry {
    /// What the user asked.
    pub fn question(&self) -> &str {
        match self {
            ChatEntry::Pending(p) => &p.question,
            ChatEntry::Confirmed(m) => &m.question,
        }
    }

    /// The answer, once there is one.
    pub fn answer(&self) -> Option<&str> {
        match self {
            ChatEntry::Pending(_) => None,
            ChatEntry::Confirmed(m) => Some(&m.answer),
        }
    }

    /// True while the server has not confirmed the exchange.
    pub fn is_pending(&self) -> bool {
        matches!(self, ChatEntry::Pending(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::DeserializeOwned;
    use serde_json::json;
    use time::macros::datetime;

    use crate::error::Error;

    fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, Error> {
        let body = json!({ "data": value }).to_string();
        crate::validate::decode_envelope(body.as_bytes())
    }

    #[test]
    fn parse_sent_message() {
        let value = json!({
            "id": "m1",
            "question": "Hello",
            "answer": "Hi!",
            "tokens": 5,
            "createdAt": "2024-05-01T12:00:00Z",
            "sessionId": "s1"
        });
        let message: ChatMessage = decode(value).unwrap();
        assert_eq!(message.id, MessageId::from("m1"));
        assert_eq!(message.session_id, SessionId::from("s1"));
        assert_eq!(message.user_id, None);
        assert_eq!(message.answer, "Hi!");
        assert_eq!(message.tokens, 5);
        assert_eq!(message.created_at, datetime!(2024-05-01 12:00:00 UTC));
    }

    #[test]
    fn sent_message_requires_session() {
        let value = json!({
            "id": "m1",
            "question": "Hello",
            "answer": "Hi!",
            "tokens": 5,
            "createdAt": "2024-05-01T12:00:00Z"
        });
        let err = decode::<ChatMessage>(value).unwrap_err();
        assert_eq!(err.path(), Some("data.sessionId"));
    }

    #[test]
    fn history_item_into_message() {
        let value = json!({
            "id": "m7",
            "userId": "u1",
            "question": "Q",
            "answer": "A",
            "tokens": 12,
            "createdAt": "2024-05-01T12:00:00Z"
        });
        let item: HistoryItem = decode(value).unwrap();
        let message = item.into_message(SessionId::from("s9"));
        assert_eq!(message.session_id.as_str(), "s9");
        assert_eq!(message.user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn history_item_rejects_fractional_tokens() {
        let value = json!({
            "id": "m7",
            "userId": "u1",
            "question": "Q",
            "answer": "A",
            "tokens": 1.5,
            "createdAt": "2024-05-01T12:00:00Z"
        });
        let err = decode::<HistoryItem>(value).unwrap_err();
        assert_eq!(err.path(), Some("data.tokens"));
    }

    #[test]
    fn history_item_requires_owner() {
        let value = json!({
            "id": "m7",
            "question": "Q",
            "answer": "A",
            "tokens": 1,
            "createdAt": "2024-05-01T12:00:00Z"
        });
        let err = decode::<HistoryItem>(value).unwrap_err();
        assert_eq!(err.path(), Some("data.userId"));
    }

    #[test]
    fn chat_entry_accessors() {
        let pending = ChatEntry::Pending(PendingMessage {
            temp_id: ClientTempId(1),
            session_id: None,
            question: "Hello".to_string(),
            created_at: datetime!(2024-05-01 12:00:00 UTC),
        });
        assert!(pending.is_pending());
        assert_eq!(pending.question(), "Hello");
        assert_eq!(pending.answer(), None);
        assert_eq!(ClientTempId(1).to_string(), "pending-1");
    }
}
