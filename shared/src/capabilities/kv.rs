use crux_kv::error::KeyValueError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{AppError, ErrorKind};

/// Only the current session is persisted.
pub const SESSION_RECORD_KEY: &str = "current";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KvKey {
    namespace: KeyNamespace,
    key: String,
}

impl KvKey {
    #[must_use]
    pub fn session() -> Self {
        Self {
            namespace: KeyNamespace::Session,
            key: SESSION_RECORD_KEY.to_string(),
        }
    }

    #[must_use]
    pub fn raw(&self) -> String {
        format!("{}:{}", self.namespace.prefix(), self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyNamespace {
    Session,
}

impl KeyNamespace {
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            KeyNamespace::Session => "session",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvError {
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<KeyValueError> for KvError {
    fn from(e: KeyValueError) -> Self {
        KvError::Storage(e.to_string())
    }
}

impl From<KvError> for AppError {
    fn from(e: KvError) -> Self {
        AppError::new(ErrorKind::Storage, "Could not access saved session").with_internal(e.to_string())
    }
}
