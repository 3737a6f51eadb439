//! In-memory rescue request store.
//!
//! Requests live in a single map keyed by id; a separate vector keeps intake
//! order. Views such as the accepted-rescues list are derived from this one
//! collection and never hold their own copies.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

use crate::error::{StoreAction, StoreError};
use crate::request::{RequestId, RequestStatus, RescueRequest};

/// How `complete` treats requests that are absent or not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Always remove; absent ids are a no-op.
    #[default]
    Lenient,
    /// Only accepted requests can be completed.
    Strict,
}

#[derive(Debug, Clone, Default)]
pub struct RescueStore {
    requests: HashMap<RequestId, RescueRequest>,
    order: Vec<RequestId>,
}

impl RescueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &RequestId) -> Option<&RescueRequest> {
        self.requests.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &RequestId) -> bool {
        self.requests.contains_key(id)
    }

    /// Requests in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &RescueRequest> + '_ {
        self.order.iter().filter_map(|id| self.requests.get(id))
    }

    pub fn insert(&mut self, request: RescueRequest) -> Result<(), StoreError> {
        if self.requests.contains_key(&request.id) {
            return Err(StoreError::Duplicate { id: request.id });
        }
        self.order.push(request.id.clone());
        self.requests.insert(request.id.clone(), request);
        Ok(())
    }

    /// Replaces the live set with a fresh intake listing. The first record
    /// wins when ids repeat.
    #[instrument(skip_all)]
    pub fn replace_all(&mut self, requests: impl IntoIterator<Item = RescueRequest>) -> usize {
        self.requests.clear();
        self.order.clear();

        let mut dropped = 0usize;
        for request in requests {
            if let Err(StoreError::Duplicate { id }) = self.insert(request) {
                warn!(request_id = %id, "duplicate id in intake listing");
                dropped += 1;
            }
        }

        info!(loaded = self.len(), dropped, "rescue requests loaded");
        self.len()
    }

    /// `Waiting -> Accepted`. Anything else is rejected so a second accept
    /// never goes through twice.
    #[instrument(skip(self), fields(request_id = %id))]
    pub fn accept(&mut self, id: &RequestId) -> Result<&RescueRequest, StoreError> {
        let request = self
            .requests
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;

        if !request.status.is_acceptable() {
            warn!(status = %request.status, "accept rejected");
            return Err(StoreError::InvalidTransition {
                id: id.clone(),
                from: request.status,
                action: StoreAction::Accept,
            });
        }

        request.status = RequestStatus::Accepted;
        info!("rescue request accepted");
        Ok(&*request)
    }

    /// Removes the request whatever its status. Returns the removed request,
    /// or `None` when it was already gone.
    pub fn complete(&mut self, id: &RequestId) -> Option<RescueRequest> {
        let removed = self.requests.remove(id);
        if removed.is_some() {
            self.order.retain(|existing| existing != id);
            info!(request_id = %id, "rescue request completed");
        } else {
            debug!(request_id = %id, "complete on absent request ignored");
        }
        removed
    }

    #[instrument(skip(self), fields(request_id = %id))]
    pub fn complete_with(
        &mut self,
        id: &RequestId,
        policy: CompletionPolicy,
    ) -> Result<Option<RescueRequest>, StoreError> {
        if policy == CompletionPolicy::Strict {
            let request = self
                .requests
                .get(id)
                .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
            if !request.status.is_accepted() {
                return Err(StoreError::InvalidTransition {
                    id: id.clone(),
                    from: request.status,
                    action: StoreAction::Complete,
                });
            }
        }
        Ok(self.complete(id))
    }

    /// Case-insensitive match on name or phone, in insertion order. The
    /// filter is used as typed, surrounding whitespace included.
    #[must_use]
    pub fn query(&self, filter: &str) -> Vec<&RescueRequest> {
        let needle = filter.to_lowercase();
        self.iter().filter(|r| r.matches(&needle)).collect()
    }

    #[must_use]
    pub fn count_by_status(&self, status: RequestStatus) -> usize {
        self.requests.values().filter(|r| r.status == status).count()
    }
}
