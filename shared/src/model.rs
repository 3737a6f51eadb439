use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::capabilities::SubscriptionId;
use crate::chat::MessageLog;
use crate::config::CoreConfig;
use crate::error::AppError;
use crate::geo::{Coordinate, Route};
use crate::request::{MessageId, RequestId};
use crate::session::AuthenticatedUser;
use crate::store::RescueStore;
use crate::{get_current_time_ms, UnixTimeMs};

/// Why a position fix was asked for. At most one request per purpose is in
/// flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationPurpose {
    CenterMap,
    ShareInChat,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocationState {
    pub current: Option<Coordinate>,
    pub address: Option<String>,
    /// Set when `current` is the configured default rather than a real fix.
    pub is_fallback: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapState {
    pub center: Coordinate,
    pub zoom: f64,
}

impl MapState {
    #[must_use]
    pub fn for_config(config: &CoreConfig) -> Self {
        Self {
            center: config.default_location,
            zoom: config.default_zoom,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRoute {
    pub target: RequestId,
    pub route: Route,
}

/// Chat state scoped to one open chat view.
#[derive(Debug, Default)]
pub struct ChatSession {
    pub subscription: Option<SubscriptionId>,
    pub log: MessageLog,
    pub history_loaded: bool,
    pub pending_publishes: HashSet<MessageId>,
}

impl ChatSession {
    #[must_use]
    pub fn new(max_messages: usize) -> Self {
        Self {
            subscription: None,
            log: MessageLog::with_capacity(max_messages),
            history_loaded: false,
            pending_publishes: HashSet::new(),
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.subscription.is_some()
    }

    #[must_use]
    pub fn is_current(&self, subscription: &SubscriptionId) -> bool {
        self.subscription.as_ref() == Some(subscription)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Warning => 4000,
            Self::Error => 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
    pub created_at_ms: u64,
    pub duration_ms: u64,
}

impl Notice {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: NoticeKind) -> Self {
        Self {
            message: message.into(),
            kind,
            created_at_ms: get_current_time_ms(),
            duration_ms: kind.default_duration_ms(),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) > self.duration_ms
    }
}

#[derive(Debug)]
pub struct Model {
    pub config: CoreConfig,
    pub session: Option<AuthenticatedUser>,

    pub store: RescueStore,
    pub requests_loaded: bool,
    pub search_query: String,
    pub selected: Option<RequestId>,

    pub location: LocationState,
    pub pending_locations: HashMap<LocationPurpose, UnixTimeMs>,
    pub map: MapState,
    pub route: Option<ActiveRoute>,

    pub chat: ChatSession,

    pub notice: Option<Notice>,
    pub active_error: Option<AppError>,
    pub is_loading: bool,
    pub view_timestamp_ms: u64,
}

impl Default for Model {
    fn default() -> Self {
        let config = CoreConfig::default();
        Self {
            map: MapState::for_config(&config),
            chat: ChatSession::new(config.max_chat_messages),
            config,
            session: None,
            store: RescueStore::new(),
            requests_loaded: false,
            search_query: String::new(),
            selected: None,
            location: LocationState::default(),
            pending_locations: HashMap::new(),
            route: None,
            notice: None,
            active_error: None,
            is_loading: false,
            view_timestamp_ms: get_current_time_ms(),
        }
    }
}

impl Model {
    pub fn update_timestamp(&mut self) {
        self.view_timestamp_ms = get_current_time_ms();
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    pub fn show_notice(&mut self, message: impl Into<String>, kind: NoticeKind) {
        self.notice = Some(Notice::new(message, kind));
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    /// Where distances and directions are measured from.
    #[must_use]
    pub fn origin(&self) -> Coordinate {
        self.location.current.unwrap_or(self.config.default_location)
    }

    pub fn use_fallback_location(&mut self) {
        let fallback = self.config.default_location;
        self.location = LocationState {
            current: Some(fallback),
            address: Some(fallback.to_display_string()),
            is_fallback: true,
        };
        self.map.center = fallback;
    }

    /// Drops the selection and route if they point at a request that no longer
    /// exists.
    pub fn prune_dangling(&mut self) {
        if let Some(id) = &self.selected {
            if !self.store.contains(id) {
                self.selected = None;
            }
        }
        if let Some(active) = &self.route {
            if !self.store.contains(&active.target) {
                self.route = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_location;
    use crate::geo::directions;
    use crate::request::{Priority, RescueRequest};

    #[test]
    fn defaults_center_on_fallback_location() {
        let model = Model::default();
        assert_eq!(model.map.center, default_location());
        assert_eq!(model.origin(), default_location());
        assert!(!model.location.is_fallback);
    }

    #[test]
    fn fallback_location_uses_coordinate_text_as_address() {
        let mut model = Model::default();
        model.use_fallback_location();
        assert!(model.location.is_fallback);
        assert_eq!(model.location.address.as_deref(), Some("10.7769, 106.7009"));
    }

    #[test]
    fn prune_clears_references_to_removed_requests() {
        let mut model = Model::default();
        let at = Coordinate::new(10.78, 106.70).unwrap();
        model
            .store
            .insert(RescueRequest::new("1", "A", "0901", at, Priority::High))
            .unwrap();
        model.selected = Some(RequestId::new("1"));
        model.route = Some(ActiveRoute {
            target: RequestId::new("1"),
            route: directions(model.origin(), at),
        });

        model.prune_dangling();
        assert!(model.selected.is_some());

        model.store.complete(&RequestId::new("1"));
        model.prune_dangling();
        assert!(model.selected.is_none());
        assert!(model.route.is_none());
    }

    #[test]
    fn notice_expiry() {
        let notice = Notice {
            message: "x".into(),
            kind: NoticeKind::Success,
            created_at_ms: 1_000,
            duration_ms: NoticeKind::Success.default_duration_ms(),
        };
        assert!(!notice.is_expired(2_500));
        assert!(notice.is_expired(3_001));
    }
}
