//! Publish/subscribe access to the shell-owned realtime socket.
//!
//! The socket connection is process-wide and lives in the shell. The core only
//! ever holds subscriptions, each identified by a [`SubscriptionId`] so late
//! deliveries for a released subscription can be told apart.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub String);

impl SubscriptionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("sub-{}", Uuid::new_v4()))
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RealtimeOperation {
    /// Streams every payload received on `event` until unsubscribed.
    Subscribe {
        subscription: SubscriptionId,
        event: String,
    },
    Unsubscribe {
        subscription: SubscriptionId,
    },
    Publish {
        event: String,
        payload: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RealtimeOutput {
    Message { payload: String },
    Published,
    Unsubscribed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RealtimeError {
    #[error("realtime channel is not connected")]
    NotConnected,
    #[error("publish failed: {reason}")]
    PublishFailed { reason: String },
    #[error("connection lost: {reason}")]
    Disconnected { reason: String },
}

impl From<RealtimeError> for TransportError {
    fn from(e: RealtimeError) -> Self {
        TransportError::Channel(e.to_string())
    }
}

pub type RealtimeResult = Result<RealtimeOutput, RealtimeError>;

impl Operation for RealtimeOperation {
    type Output = RealtimeResult;
}

pub struct Realtime<Ev> {
    context: CapabilityContext<RealtimeOperation, Ev>,
}

impl<Ev> Capability<Ev> for Realtime<Ev> {
    type Operation = RealtimeOperation;
    type MappedSelf<MappedEv> = Realtime<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Realtime::new(self.context.map_event(f))
    }
}

impl<Ev> Realtime<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<RealtimeOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn subscribe<F>(&self, subscription: SubscriptionId, event: impl Into<String>, make_event: F)
    where
        F: Fn(SubscriptionId, RealtimeResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        let operation = RealtimeOperation::Subscribe {
            subscription: subscription.clone(),
            event: event.into(),
        };
        self.context.spawn(async move {
            let mut stream = ctx.stream_from_shell(operation);
            while let Some(delivery) = stream.next().await {
                ctx.update_app(make_event(subscription.clone(), delivery));
            }
        });
    }

    pub fn publish<F>(&self, event: impl Into<String>, payload: String, make_event: F)
    where
        F: FnOnce(RealtimeResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        let operation = RealtimeOperation::Publish {
            event: event.into(),
            payload,
        };
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(result));
        });
    }

    pub fn unsubscribe<F>(&self, subscription: SubscriptionId, make_event: F)
    where
        F: FnOnce(SubscriptionId, RealtimeResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx
                .request_from_shell(RealtimeOperation::Unsubscribe {
                    subscription: subscription.clone(),
                })
                .await;
            ctx.update_app(make_event(subscription, result));
        });
    }
}
