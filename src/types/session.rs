use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::validate::{identifier, required_string};

/// Number of characters of the opening question used as a provisional title.
pub const PROVISIONAL_TITLE_CHARS: usize = 50;

/// Server-assigned identifier of a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        identifier(deserializer).map(Self)
    }
}

/// Summary of a conversation thread as listed by `GET /api/chat/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Unique session identifier.
    pub id: SessionId,

    /// Owner of the session.  Required on the wire; absent only on
    /// provisional summaries.
    #[serde(
        deserialize_with = "required_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,

    /// Display title; the server may not have chosen one yet.
    #[serde(default)]
    pub title: Option<String>,

    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the session last changed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,

    /// True for a summary synthesized locally after a send created the
    /// session and not yet reconciled with the server's listing.
    #[serde(skip)]
    pub provisional: bool,
}

impl SessionSummary {
    /// Synthesize a provisional summary for a session the server just created.
    ///
    /// The title is the first [`PROVISIONAL_TITLE_CHARS`] characters of the
    /// trimmed question, with `...` appended when it had to be cut.
    pub fn provisional(id: SessionId, question: &str, now: OffsetDateTime) -> Self {
        Self {
            id,
            user_id: None,
            title: Some(provisional_title(question)),
            created_at: now,
            updated_at: now,
            provisional: true,
        }
    }

    /// The title to show, falling back to a placeholder.
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => "New chat",
        }
    }
}

fn provisional_title(question: &str) -> String {
    let trimmed = question.trim();
    let mut chars = trimmed.chars();
    let head: String = chars.by_ref().take(PROVISIONAL_TITLE_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    use crate::error::Error;

    fn decode(value: serde_json::Value) -> Result<SessionSummary, Error> {
        let body = json!({ "data": value }).to_string();
        crate::validate::decode_envelope(body.as_bytes())
    }

    #[test]
    fn parse_server_summary() {
        let value = json!({
            "id": "s1",
            "userId": "u1",
            "title": null,
            "createdAt": "2024-05-01T12:00:00.000Z",
            "updatedAt": "2024-05-01T12:05:00Z"
        });
        let summary = decode(value).unwrap();
        assert_eq!(summary.id, SessionId::from("s1"));
        assert_eq!(summary.user_id.as_deref(), Some("u1"));
        assert_eq!(summary.title, None);
        assert_eq!(summary.created_at, datetime!(2024-05-01 12:00:00 UTC));
        assert!(!summary.provisional);
        assert_eq!(summary.display_title(), "New chat");
    }

    #[test]
    fn parse_rejects_numeric_title() {
        let value = json!({
            "id": "s1",
            "userId": "u1",
            "title": 12,
            "createdAt": "2024-05-01T12:00:00Z",
            "updatedAt": "2024-05-01T12:00:00Z"
        });
        let err = decode(value).unwrap_err();
        assert_eq!(err.path(), Some("data.title"));
    }

    #[test]
    fn parse_requires_owner() {
        let value = json!({
            "id": "s1",
            "title": "Hi",
            "createdAt": "2024-05-01T12:00:00Z",
            "updatedAt": "2024-05-01T12:00:00Z"
        });
        let err = decode(value).unwrap_err();
        assert_eq!(err.path(), Some("data.userId"));
    }

    #[test]
    fn parse_allows_missing_title_and_rejects_empty_id() {
        let value = json!({
            "id": "s1",
            "userId": "u1",
            "createdAt": "2024-05-01T12:00:00Z",
            "updatedAt": "2024-05-01T12:00:00Z"
        });
        assert_eq!(decode(value).unwrap().title, None);

        let value = json!({
            "id": "",
            "userId": "u1",
            "createdAt": "2024-05-01T12:00:00Z",
            "updatedAt": "2024-05-01T12:00:00Z"
        });
        assert_eq!(decode(value).unwrap_err().path(), Some("data.id"));
    }

    #[test]
    fn provisional_title_short_question() {
        let now = datetime!(2024-05-01 12:00:00 UTC);
        let summary = SessionSummary::provisional(SessionId::from("s1"), "  Hello  ", now);
        assert_eq!(summary.title.as_deref(), Some("Hello"));
        assert!(summary.provisional);
        assert_eq!(summary.created_at, now);
        assert_eq!(summary.updated_at, now);
    }

    #[test]
    fn provisional_title_truncates_on_char_boundary() {
        let now = datetime!(2024-05-01 12:00:00 UTC);
        let question = "é".repeat(60);
        let summary = SessionSummary::provisional(SessionId::from("s1"), &question, now);
        let title = summary.title.unwrap();
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), PROVISIONAL_TITLE_CHARS + 3);

        let exact = "x".repeat(PROVISIONAL_TITLE_CHARS);
        let summary = SessionSummary::provisional(SessionId::from("s2"), &exact, now);
        assert_eq!(summary.title.as_deref(), Some(exact.as_str()));
    }

    #[test]
    fn serializes_camel_case() {
        let summary = SessionSummary {
            id: SessionId::from("s1"),
            user_id: Some("u1".to_string()),
            title: Some("Hello".to_string()),
            created_at: datetime!(2024-05-01 12:00:00 UTC),
            updated_at: datetime!(2024-05-01 12:00:00 UTC),
            provisional: false,
        };
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({
                "id": "s1",
                "userId": "u1",
                "title": "Hello",
                "createdAt": "2024-05-01T12:00:00Z",
                "updatedAt": "2024-05-01T12:00:00Z"
            })
        );
    }
}
