//! Opaque user identity key.
//!
//! [`UserId`] wraps the identifier supplied by the surrounding session layer.
//! The hub never re-derives or authenticates it; it only checks that the key
//! is usable (non-empty, bounded, printable) before using it as a registry
//! key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// Upper bound on the byte length of a user identity.
pub const MAX_USER_ID_LEN: usize = 256;

/// Identity of the user owning one or more connections.
///
/// Compared and hashed as an exact string: `"u1"` and `" u1"` are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validates and wraps a raw identity string.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidUserId`] if the value is blank, longer
    /// than [`MAX_USER_ID_LEN`] bytes, or contains control characters.
    pub fn parse(raw: impl Into<String>) -> Result<Self, HubError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(HubError::InvalidUserId("must not be empty".to_string()));
        }
        if raw.len() > MAX_USER_ID_LEN {
            return Err(HubError::InvalidUserId(format!(
                "must be at most {MAX_USER_ID_LEN} bytes"
            )));
        }
        if raw.chars().any(char::is_control) {
            return Err(HubError::InvalidUserId(
                "must not contain control characters".to_string(),
            ));
        }
        Ok(Self(raw))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = HubError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identity() {
        let Ok(id) = UserId::parse("u1") else {
            panic!("expected valid user id");
        };
        assert_eq!(id.as_str(), "u1");
        assert_eq!(id.to_string(), "u1");
    }

    #[test]
    fn rejects_empty_and_blank() {
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse("   ").is_err());
    }

    #[test]
    fn rejects_control_characters() {
        assert!(UserId::parse("u1\n").is_err());
        assert!(UserId::parse("u\u{0}1").is_err());
    }

    #[test]
    fn rejects_oversized_identity() {
        let long = "x".repeat(MAX_USER_ID_LEN + 1);
        assert!(UserId::parse(long).is_err());
        let max = "x".repeat(MAX_USER_ID_LEN);
        assert!(UserId::parse(max).is_ok());
    }

    #[test]
    fn deserialize_validates() {
        let ok: Result<UserId, _> = serde_json::from_str("\"alice\"");
        assert!(ok.is_ok());
        let bad: Result<UserId, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }
}
