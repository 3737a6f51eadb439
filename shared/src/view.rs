//! Serializable view model handed to the shell after every render.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;
use crate::error::{AppError, ErrorSeverity};
use crate::format_time_ago;
use crate::geo::{distance_km, format_distance_km, Coordinate};
use crate::model::{ActiveRoute, ChatSession, Notice, NoticeKind};
use crate::projection::AcceptedRescueItem;
use crate::request::{Priority, RequestStatus, RescueRequest, UserId};
use crate::session::AuthenticatedUser;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NoticeView {
    pub message: String,
    pub kind: NoticeKind,
    pub duration_ms: u64,
}

impl From<&Notice> for NoticeView {
    fn from(n: &Notice) -> Self {
        Self {
            message: n.message.clone(),
            kind: n.kind,
            duration_ms: n.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionView {
    pub user_id: String,
    pub display_name: String,
}

impl From<&AuthenticatedUser> for SessionView {
    fn from(user: &AuthenticatedUser) -> Self {
        Self {
            user_id: user.id.to_string(),
            display_name: user.display_name.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LocationView {
    pub lat: f64,
    pub lon: f64,
    pub address: Option<String>,
    pub is_fallback: bool,
    pub is_locating: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MapPin {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub priority: Priority,
    pub is_accepted: bool,
    pub is_selected: bool,
}

impl MapPin {
    pub(crate) fn build(request: &RescueRequest, selected: Option<&str>) -> Self {
        Self {
            id: request.id.to_string(),
            lat: request.location.lat(),
            lon: request.location.lon(),
            priority: request.priority,
            is_accepted: request.status.is_accepted(),
            is_selected: selected == Some(request.id.as_str()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RouteView {
    pub target_id: String,
    pub length_km: f64,
    pub length_text: String,
    /// A GeoJSON `LineString` geometry.
    pub geojson: String,
}

impl From<&ActiveRoute> for RouteView {
    fn from(active: &ActiveRoute) -> Self {
        let length_km = active.route.length_km();
        Self {
            target_id: active.target.to_string(),
            length_km,
            length_text: format_distance_km(length_km),
            geojson: active.route.to_geojson().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MapView {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: f64,
    pub pins: Vec<MapPin>,
    pub route: Option<RouteView>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RequestListItem {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
    pub status: RequestStatus,
    pub status_text: String,
    pub priority: Priority,
    pub distance_km: f64,
    pub distance_text: String,
}

impl RequestListItem {
    pub(crate) fn build(request: &RescueRequest, origin: Coordinate) -> Self {
        let distance = distance_km(origin, request.location);
        Self {
            id: request.id.to_string(),
            name: request.name.clone(),
            phone: request.phone.clone(),
            address: request.address.clone(),
            status: request.status,
            status_text: request.status.display_name().to_string(),
            priority: request.priority,
            distance_km: distance,
            distance_text: format_distance_km(distance),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestAction {
    Accept,
    Complete,
    Directions,
    Call,
}

impl RequestAction {
    #[must_use]
    pub fn available_for(status: RequestStatus) -> Vec<Self> {
        let mut actions = Vec::with_capacity(3);
        if status.is_acceptable() {
            actions.push(Self::Accept);
        } else if status.is_accepted() {
            actions.push(Self::Complete);
        }
        actions.push(Self::Directions);
        actions.push(Self::Call);
        actions
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RequestDetail {
    pub item: RequestListItem,
    pub message: Option<String>,
    pub image: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub actions: Vec<RequestAction>,
}

impl RequestDetail {
    pub(crate) fn build(request: &RescueRequest, origin: Coordinate) -> Self {
        Self {
            item: RequestListItem::build(request, origin),
            message: request.message.clone(),
            image: request.image.clone(),
            lat: request.location.lat(),
            lon: request.location.lon(),
            actions: RequestAction::available_for(request.status),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessageView {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    pub timestamp_ms: u64,
    pub time_label: String,
    pub time_ago: String,
    pub is_own: bool,
    pub is_pending: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatDayGroup {
    /// `YYYY-MM-DD`, UTC.
    pub day: String,
    pub messages: Vec<ChatMessageView>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ChatView {
    pub is_open: bool,
    pub history_loaded: bool,
    pub can_send: bool,
    pub message_count: usize,
    pub days: Vec<ChatDayGroup>,
}

fn utc_labels(timestamp_ms: u64) -> (String, String) {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map_or_else(
            || ("unknown".to_string(), "--:--".to_string()),
            |at| (at.format("%Y-%m-%d").to_string(), at.format("%H:%M").to_string()),
        )
}

fn sender_label(chat: &ChatSession, message: &ChatMessage, me: Option<&UserId>) -> String {
    if me == Some(&message.sender_id) {
        return "You".to_string();
    }
    chat.log
        .sender_name(&message.sender_id)
        .map_or_else(|| message.sender_id.to_string(), str::to_string)
}

impl ChatView {
    pub(crate) fn build(chat: &ChatSession, me: Option<&AuthenticatedUser>, now_ms: u64) -> Self {
        let my_id = me.map(|u| &u.id);
        let mut days: Vec<ChatDayGroup> = Vec::new();

        for message in chat.log.messages() {
            let (day, time_label) = utc_labels(message.timestamp.0);
            let view = ChatMessageView {
                id: message.id.to_string(),
                sender_id: message.sender_id.to_string(),
                sender_name: sender_label(chat, message, my_id),
                text: message.text.clone(),
                timestamp_ms: message.timestamp.0,
                time_label,
                time_ago: format_time_ago(message.timestamp.0, now_ms),
                is_own: my_id == Some(&message.sender_id),
                is_pending: chat.pending_publishes.contains(&message.id),
            };

            match days.last_mut() {
                Some(group) if group.day == day => group.messages.push(view),
                _ => days.push(ChatDayGroup {
                    day,
                    messages: vec![view],
                }),
            }
        }

        Self {
            is_open: chat.is_open(),
            history_loaded: chat.history_loaded,
            can_send: chat.is_open() && me.is_some(),
            message_count: chat.log.len(),
            days,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RequestStats {
    pub total: usize,
    pub waiting: usize,
    pub accepted: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub session: Option<SessionView>,
    pub location: LocationView,
    pub map: MapView,
    pub search_query: String,
    pub requests: Vec<RequestListItem>,
    pub requests_loaded: bool,
    pub selected: Option<RequestDetail>,
    pub accepted: Vec<AcceptedRescueItem>,
    pub stats: RequestStats,
    pub chat: ChatView,
    pub notice: Option<NoticeView>,
    pub error: Option<UserFacingError>,
    pub is_loading: bool,
}
