use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::UserId;

/// What a signed-in user brings to the chat and map: an identity and a name to
/// show. Everything that needs "the current user" depends on this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("user id must not be empty")]
    EmptyId,
    #[error("display name must not be empty")]
    EmptyDisplayName,
    #[error("stored session is unreadable: {0}")]
    Corrupt(String),
}

impl AuthenticatedUser {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Result<Self, SessionError> {
        let user = Self {
            id: UserId::new(id.into().trim()),
            display_name: display_name.into().trim().to_string(),
        };
        user.validate()?;
        Ok(user)
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.id.as_str().is_empty() {
            return Err(SessionError::EmptyId);
        }
        if self.display_name.is_empty() {
            return Err(SessionError::EmptyDisplayName);
        }
        Ok(())
    }
}

/// Persisted form of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub version: u32,
    pub user: AuthenticatedUser,
}

impl SessionRecord {
    pub const CURRENT_VERSION: u32 = 1;

    #[must_use]
    pub fn new(user: AuthenticatedUser) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            user,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SessionError> {
        serde_json::to_vec(self).map_err(|e| SessionError::Corrupt(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SessionError> {
        let record: Self =
            serde_json::from_slice(bytes).map_err(|e| SessionError::Corrupt(e.to_string()))?;
        if record.version != Self::CURRENT_VERSION {
            return Err(SessionError::Corrupt(format!(
                "unsupported version {}",
                record.version
            )));
        }
        record.user.validate()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_identity() {
        assert_eq!(AuthenticatedUser::new("  ", "Rescue"), Err(SessionError::EmptyId));
        assert_eq!(
            AuthenticatedUser::new("1", ""),
            Err(SessionError::EmptyDisplayName)
        );
    }

    #[test]
    fn record_round_trips() {
        let user = AuthenticatedUser::new("1", "Nguyen Cuu Ho").unwrap();
        let bytes = SessionRecord::new(user.clone()).to_bytes().unwrap();
        assert_eq!(SessionRecord::from_bytes(&bytes).unwrap().user, user);
    }

    #[test]
    fn unknown_version_is_corrupt() {
        let bytes = br#"{"version": 9, "user": {"id": "1", "display_name": "X"}}"#;
        assert!(matches!(
            SessionRecord::from_bytes(bytes),
            Err(SessionError::Corrupt(_))
        ));
    }
}
