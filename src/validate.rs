//! Decoding and validation of server payloads.
//!
//! Every response that crosses the API boundary is decoded here.  The wire
//! shapes are the serde derives on the record types; this module unwraps the
//! `{message, data}` envelope and turns any decoding failure into an
//! [`Error::Validation`] naming the offending field path.

use std::fmt;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_path_to_error::Segment;

use crate::error::{Error, Result};
use crate::observability::VALIDATION_ERRORS;

/// A JSON path such as `data[2].createdAt`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldPath {
    rendered: String,
}

impl FieldPath {
    /// The empty path, denoting the document root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Descend into an object member.
    pub fn field(&self, name: &str) -> Self {
        let rendered = if self.rendered.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.rendered, name)
        };
        Self { rendered }
    }

    /// Descend into an array element.
    pub fn index(&self, idx: usize) -> Self {
        Self {
            rendered: format!("{}[{}]", self.rendered, idx),
        }
    }

    /// The rendered path; `$` for the root.
    pub fn as_str(&self) -> &str {
        if self.rendered.is_empty() {
            "$"
        } else {
            &self.rendered
        }
    }

    /// Build a validation error anchored at this path.
    pub fn error(&self, message: impl Into<String>) -> Error {
        VALIDATION_ERRORS.click();
        Error::validation(message, Some(self.as_str().to_string()))
    }
}

impl From<&serde_path_to_error::Path> for FieldPath {
    fn from(path: &serde_path_to_error::Path) -> Self {
        path.iter().fold(FieldPath::root(), |acc, segment| match segment {
            Segment::Seq { index } => acc.index(*index),
            Segment::Map { key } => acc.field(key),
            Segment::Enum { variant } => acc.field(variant),
            Segment::Unknown => acc.field("?"),
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    #[allow(dead_code)]
    message: Option<String>,
    data: T,
}

/// Decode a `{message, data}` response envelope and return `data`.
///
/// The body must be an object carrying `data`.  `message` is optional but
/// must be a string when present.  There is no fallback to treating the
/// whole body as the payload.
pub fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let mut de = serde_json::Deserializer::from_slice(body);
    let envelope: Envelope<T> =
        serde_path_to_error::deserialize(&mut de).map_err(validation_error)?;
    de.end()
        .map_err(|err| FieldPath::root().error(format!("response is not valid JSON: {err}")))?;
    Ok(envelope.data)
}

fn validation_error(err: serde_path_to_error::Error<serde_json::Error>) -> Error {
    let path = FieldPath::from(err.path());
    let inner = err.into_inner();
    if inner.is_syntax() || inner.is_eof() {
        return FieldPath::root().error(format!("response is not valid JSON: {inner}"));
    }
    let message = without_position(&inner.to_string());
    // serde reports a missing member at its parent; point at the member.
    match missing_field(&message) {
        Some(name) => path.field(name).error("required field is missing"),
        None => path.error(message),
    }
}

fn without_position(message: &str) -> String {
    match message.rfind(" at line ") {
        Some(idx) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

fn missing_field(message: &str) -> Option<&str> {
    message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.strip_suffix('`'))
}

/// Deserialize a string that must not be empty.
pub(crate) fn identifier<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    let id = String::deserialize(deserializer)?;
    if id.is_empty() {
        return Err(D::Error::custom("identifier must not be empty"));
    }
    Ok(id)
}

/// Deserialize a required string into an `Option` that is always `Some`.
///
/// For members the server always sends but locally built records may lack.
pub(crate) fn required_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    String::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::OffsetDateTime;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Pair {
        name: String,
        hits: u64,
    }

    #[derive(Debug, Deserialize)]
    struct Stamp {
        #[serde(with = "time::serde::rfc3339")]
        #[allow(dead_code)]
        at: OffsetDateTime,
    }

    #[test]
    fn field_path_rendering() {
        let path = FieldPath::root().field("data").index(2).field("createdAt");
        assert_eq!(path.as_str(), "data[2].createdAt");
        assert_eq!(FieldPath::root().as_str(), "$");
    }

    #[test]
    fn decode_envelope_unwraps_data() {
        let body = json!({"message": "ok", "data": [{"name": "a", "hits": 1}]}).to_string();
        let pairs: Vec<Pair> = decode_envelope(body.as_bytes()).unwrap();
        assert_eq!(
            pairs,
            vec![Pair {
                name: "a".to_string(),
                hits: 1
            }]
        );
    }

    #[test]
    fn decode_envelope_requires_data() {
        let body = json!([{"name": "a", "hits": 1}]).to_string();
        let err = decode_envelope::<Vec<Pair>>(body.as_bytes()).unwrap_err();
        assert_eq!(err.path(), Some("$"));

        let body = json!({"message": "ok"}).to_string();
        let err = decode_envelope::<Vec<Pair>>(body.as_bytes()).unwrap_err();
        assert_eq!(err.path(), Some("data"));
        assert_eq!(err.user_message(), "required field is missing (data)");
    }

    #[test]
    fn decode_envelope_rejects_non_string_message() {
        let body = json!({"message": 7, "data": []}).to_string();
        let err = decode_envelope::<Vec<Pair>>(body.as_bytes()).unwrap_err();
        assert_eq!(err.path(), Some("message"));

        let body = json!({"message": null, "data": []}).to_string();
        assert!(decode_envelope::<Vec<Pair>>(body.as_bytes()).is_ok());
    }

    #[test]
    fn nested_errors_carry_full_path() {
        let body = json!({"data": [{"name": "a", "hits": 1}, {"name": "b", "hits": -3}]})
            .to_string();
        let err = decode_envelope::<Vec<Pair>>(body.as_bytes()).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.path(), Some("data[1].hits"));

        let body = json!({"data": [{"hits": 1}]}).to_string();
        let err = decode_envelope::<Vec<Pair>>(body.as_bytes()).unwrap_err();
        assert_eq!(err.path(), Some("data[0].name"));
    }

    #[test]
    fn invalid_json_is_a_validation_error() {
        let err = decode_envelope::<Vec<Pair>>(b"<html>").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.path(), Some("$"));

        let err = decode_envelope::<Vec<Pair>>(br#"{"data": []} trailing"#).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn timestamps_must_be_rfc3339() {
        let body = json!({"data": {"at": "yesterday"}}).to_string();
        let err = decode_envelope::<Stamp>(body.as_bytes()).unwrap_err();
        assert_eq!(err.path(), Some("data.at"));

        let body = json!({"data": {"at": "2024-05-01T12:30:00.000Z"}}).to_string();
        assert!(decode_envelope::<Stamp>(body.as_bytes()).is_ok());
    }

    #[test]
    fn identifiers_must_not_be_empty() {
        #[derive(Debug, Deserialize)]
        struct Named {
            #[serde(deserialize_with = "identifier")]
            #[allow(dead_code)]
            id: String,
        }
        let body = json!({"data": {"id": ""}}).to_string();
        let err = decode_envelope::<Named>(body.as_bytes()).unwrap_err();
        assert_eq!(err.path(), Some("data.id"));
        assert!(err.user_message().starts_with("identifier must not be empty"));
    }
}
