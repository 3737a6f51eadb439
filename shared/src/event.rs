use crux_kv::error::KeyValueError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capabilities::{GeolocationResult, RealtimeResult, ReverseGeocodeResponse, SubscriptionId};
use crate::config::CoreConfig;
use crate::geo::Coordinate;
use crate::model::LocationPurpose;
use crate::request::{MessageId, RequestId};
use crate::session::AuthenticatedUser;

pub type HttpOutcome<T> = crux_http::Result<crux_http::Response<T>>;
pub type KvOutcome = Result<Option<Vec<u8>>, KeyValueError>;

// --- Event enum: capability responses are shell-internal and never serialized ---

#[derive(Serialize, Deserialize, Debug)]
pub enum Event {
    // Lifecycle & session
    AppStarted,
    Configure(Box<CoreConfig>),
    SignedIn(AuthenticatedUser),
    SignOut,

    // Requests & map
    RefreshRequests,
    SearchChanged(String),
    RequestSelected(RequestId),
    SelectionCleared,
    AcceptRequested(RequestId),
    CompleteRequested(RequestId),
    DirectionsRequested(RequestId),
    RouteCleared,
    CallRequested(RequestId),
    LocateMe,

    // Chat
    ChatOpened,
    ChatClosed,
    SendMessage(String),
    ShareLocationRequested,

    // Feedback
    NoticeDismissed,
    ErrorDismissed,

    // Capability responses (boxed to keep the enum small)
    #[serde(skip)]
    /// Raw listing items, decoded one by one.
    RequestsLoaded(Box<HttpOutcome<Vec<Value>>>),
    #[serde(skip)]
    HistoryLoaded {
        subscription: SubscriptionId,
        result: Box<HttpOutcome<Vec<Value>>>,
    },
    #[serde(skip)]
    AddressResolved {
        at: Coordinate,
        result: Box<HttpOutcome<ReverseGeocodeResponse>>,
    },
    #[serde(skip)]
    LocationResolved {
        purpose: LocationPurpose,
        result: GeolocationResult,
    },
    #[serde(skip)]
    ChannelDelivery {
        subscription: SubscriptionId,
        result: RealtimeResult,
    },
    #[serde(skip)]
    MessagePublished {
        id: MessageId,
        result: RealtimeResult,
    },
    #[serde(skip)]
    ChannelReleased {
        subscription: SubscriptionId,
        result: RealtimeResult,
    },
    #[serde(skip)]
    SessionLoaded(KvOutcome),
    #[serde(skip)]
    SessionSaved(KvOutcome),
    #[serde(skip)]
    SessionCleared(KvOutcome),
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AppStarted => "app_started",
            Self::Configure(_) => "configure",
            Self::SignedIn(_) => "signed_in",
            Self::SignOut => "sign_out",
            Self::RefreshRequests => "refresh_requests",
            Self::SearchChanged(_) => "search_changed",
            Self::RequestSelected(_) => "request_selected",
            Self::SelectionCleared => "selection_cleared",
            Self::AcceptRequested(_) => "accept_requested",
            Self::CompleteRequested(_) => "complete_requested",
            Self::DirectionsRequested(_) => "directions_requested",
            Self::RouteCleared => "route_cleared",
            Self::CallRequested(_) => "call_requested",
            Self::LocateMe => "locate_me",
            Self::ChatOpened => "chat_opened",
            Self::ChatClosed => "chat_closed",
            Self::SendMessage(_) => "send_message",
            Self::ShareLocationRequested => "share_location_requested",
            Self::NoticeDismissed => "notice_dismissed",
            Self::ErrorDismissed => "error_dismissed",
            Self::RequestsLoaded(_) => "requests_loaded",
            Self::HistoryLoaded { .. } => "history_loaded",
            Self::AddressResolved { .. } => "address_resolved",
            Self::LocationResolved { .. } => "location_resolved",
            Self::ChannelDelivery { .. } => "channel_delivery",
            Self::MessagePublished { .. } => "message_published",
            Self::ChannelReleased { .. } => "channel_released",
            Self::SessionLoaded(_) => "session_loaded",
            Self::SessionSaved(_) => "session_saved",
            Self::SessionCleared(_) => "session_cleared",
        }
    }

    /// Events originating from the shell's UI rather than a capability.
    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        !matches!(
            self,
            Self::RequestsLoaded(_)
                | Self::HistoryLoaded { .. }
                | Self::AddressResolved { .. }
                | Self::LocationResolved { .. }
                | Self::ChannelDelivery { .. }
                | Self::MessagePublished { .. }
                | Self::ChannelReleased { .. }
                | Self::SessionLoaded(_)
                | Self::SessionSaved(_)
                | Self::SessionCleared(_)
        )
    }
}
