//! Chat messages and the consumer side of the realtime channel.
//!
//! The channel is best effort: messages can arrive twice (including the echo
//! of our own publish), out of order, or not at all. `MessageLog` absorbs the
//! first two and shows whatever did arrive in timestamp order.

use chrono::DateTime;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::TransportError;
use crate::request::{MessageId, UserId};
use crate::session::AuthenticatedUser;
use crate::UnixTimeMs;

pub const DEFAULT_MAX_CHAT_MESSAGES: usize = 500;
const SEEN_IDS_FACTOR: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    #[serde(rename = "userId", alias = "senderId")]
    pub sender_id: UserId,
    pub text: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: UnixTimeMs,
}

/// Senders write either epoch milliseconds or an RFC 3339 string.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Millis(u64),
    Text(String),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<UnixTimeMs, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match WireTimestamp::deserialize(deserializer)? {
        WireTimestamp::Millis(ms) => Ok(UnixTimeMs(ms)),
        WireTimestamp::Text(text) => {
            let parsed = DateTime::parse_from_rfc3339(text.trim())
                .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {text:?}: {e}")))?;
            u64::try_from(parsed.timestamp_millis())
                .map(UnixTimeMs)
                .map_err(|_| serde::de::Error::custom(format!("timestamp before epoch: {text}")))
        }
    }
}

impl ChatMessage {
    #[must_use]
    pub fn compose(sender: &AuthenticatedUser, text: impl Into<String>, now: UnixTimeMs) -> Self {
        Self {
            id: MessageId::new(format!("msg-{}", Uuid::new_v4())),
            sender_id: sender.id.clone(),
            text: text.into(),
            timestamp: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSender {
    pub id: UserId,
    pub name: String,
}

impl From<&AuthenticatedUser> for ChatSender {
    fn from(user: &AuthenticatedUser) -> Self {
        Self {
            id: user.id.clone(),
            name: user.display_name.clone(),
        }
    }
}

/// Wire envelope carried on the realtime event and returned by the history
/// service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEnvelope {
    #[serde(alias = "receiveMessage")]
    pub message: ChatMessage,
    #[serde(alias = "receiveUser")]
    pub sender: ChatSender,
}

impl ChatEnvelope {
    pub fn encode(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Decode(e.to_string()))
    }

    pub fn decode(payload: &str) -> Result<Self, TransportError> {
        serde_json::from_str(payload).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    Added,
    Duplicate,
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    message: ChatMessage,
}

/// Ordered, deduplicated, bounded list of chat messages for one session.
#[derive(Debug)]
pub struct MessageLog {
    entries: Vec<Entry>,
    seen: LruCache<MessageId, ()>,
    senders: HashMap<UserId, String>,
    next_seq: u64,
    capacity: usize,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_CHAT_MESSAGES)
    }
}

impl MessageLog {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let seen_capacity = NonZeroUsize::new(capacity.saturating_mul(SEEN_IDS_FACTOR))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Vec::new(),
            seen: LruCache::new(seen_capacity),
            senders: HashMap::new(),
            next_seq: 0,
            capacity,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &MessageId) -> bool {
        self.seen.contains(id)
    }

    /// Messages sorted by timestamp; ties keep arrival order.
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> + '_ {
        self.entries.iter().map(|e| &e.message)
    }

    #[must_use]
    pub fn sender_name(&self, id: &UserId) -> Option<&str> {
        self.senders.get(id).map(String::as_str)
    }

    pub fn append(&mut self, envelope: ChatEnvelope) -> Append {
        let ChatEnvelope { message, sender } = envelope;

        if !sender.name.is_empty() {
            self.senders.insert(sender.id, sender.name);
        }

        if self.seen.contains(&message.id) {
            debug!(message_id = %message.id, "duplicate chat message dropped");
            return Append::Duplicate;
        }
        self.seen.put(message.id.clone(), ());

        let seq = self.next_seq;
        self.next_seq += 1;

        let key = (message.timestamp, seq);
        let position = self
            .entries
            .partition_point(|e| (e.message.timestamp, e.seq) <= key);
        self.entries.insert(position, Entry { seq, message });

        if self.entries.len() > self.capacity {
            let overflow = self.entries.len() - self.capacity;
            self.entries.drain(..overflow);
        }

        Append::Added
    }

    pub fn extend(&mut self, envelopes: impl IntoIterator<Item = ChatEnvelope>) -> usize {
        envelopes
            .into_iter()
            .map(|envelope| self.append(envelope))
            .filter(|outcome| *outcome == Append::Added)
            .count()
    }

    /// Takes back a locally appended message whose publish failed.
    pub fn retract(&mut self, id: &MessageId) -> Option<ChatMessage> {
        let index = self.entries.iter().position(|e| &e.message.id == id)?;
        self.seen.pop(id);
        Some(self.entries.remove(index).message)
    }

    /// Decodes a raw channel payload and appends it. Malformed payloads are
    /// dropped.
    pub fn receive(&mut self, payload: &str) -> Option<Append> {
        match ChatEnvelope::decode(payload) {
            Ok(envelope) => Some(self.append(envelope)),
            Err(e) => {
                warn!(error = %e, "malformed realtime payload dropped");
                None
            }
        }
    }
}
