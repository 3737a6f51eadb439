use crux_core::App as CruxApp;
use serde_json::Value;
use tracing::{debug, debug_span, info, instrument, warn};

use crate::capabilities::{
    decode_each, into_body, truncate_url, Capabilities, Endpoints, KvError, KvKey, RealtimeOutput,
    ReverseGeocodeResponse, SubscriptionId,
};
use crate::chat::{Append, ChatEnvelope, ChatMessage, ChatSender};
use crate::config::{ConfigError, CoreConfig};
use crate::error::{AppError, AppResult, ErrorKind, GeolocationError, StoreError, TransportError};
use crate::event::{Event, HttpOutcome, KvOutcome};
use crate::geo::{directions, Coordinate};
use crate::model::{
    ActiveRoute, ChatSession, LocationPurpose, LocationState, MapState, Model, NoticeKind,
};
use crate::projection::accepted_items;
use crate::request::{IntakeRecord, RequestId, RequestStatus};
use crate::session::{AuthenticatedUser, SessionRecord};
use crate::view::{
    ChatView, LocationView, MapPin, MapView, NoticeView, RequestDetail, RequestListItem,
    RequestStats, RouteView, SessionView, UserFacingError, ViewModel,
};
use crate::{UnixTimeMs, LOCATION_TIMEOUT_GRACE_MS};

pub const NOTICE_ACCEPTED: &str = "Rescue request accepted";
pub const NOTICE_COMPLETED: &str = "Rescue completed";
pub const NOTICE_DIRECTIONS: &str = "Directions calculated";
pub const NOTICE_LOCATION_FALLBACK: &str =
    "Could not get your current location. Using default location.";
pub const NOTICE_LOCATION_UNSUPPORTED: &str =
    "Geolocation is not supported on this device. Using default location.";
pub const NOTICE_LOCATION_SHARED: &str = "Location shared successfully";
pub const NOTICE_SHARE_FAILED: &str =
    "Could not share your location. Please check your permissions.";
pub const NOTICE_MESSAGE_NOT_SENT: &str = "Message could not be sent. Please try again.";
pub const NOTICE_CHAT_DISCONNECTED: &str = "Chat connection lost";
pub const NOTICE_SIGNED_IN: &str = "Login successful";
pub const NOTICE_SIGNED_OUT: &str = "Logged out successfully";

#[derive(Default)]
pub struct App;

impl App {
    fn endpoints(model: &mut Model) -> Option<Endpoints> {
        match Endpoints::from_config(&model.config) {
            Ok(endpoints) => Some(endpoints),
            Err(e) => {
                warn!(error = %e, "service endpoints unavailable");
                model.set_error(config_error(e));
                None
            }
        }
    }

    fn fetch_requests(model: &mut Model, caps: &Capabilities) {
        let Some(endpoints) = Self::endpoints(model) else {
            return;
        };
        debug!(url = %truncate_url(endpoints.listing()), "fetching rescue requests");
        model.is_loading = true;
        caps.http
            .get(endpoints.listing())
            .expect_json::<Vec<Value>>()
            .send(|result| Event::RequestsLoaded(Box::new(result)));
    }

    fn location_overdue(model: &Model, requested_at: UnixTimeMs) -> bool {
        let elapsed_ms = model.view_timestamp_ms.saturating_sub(requested_at.0);
        let deadline_ms = model
            .config
            .geolocation_timeout_ms
            .saturating_add(LOCATION_TIMEOUT_GRACE_MS);
        elapsed_ms > deadline_ms
    }

    /// One request per purpose may be in flight. A request the shell never
    /// answered is timed out here once its deadline has passed.
    fn request_location(model: &mut Model, caps: &Capabilities, purpose: LocationPurpose) {
        if let Some(&requested_at) = model.pending_locations.get(&purpose) {
            if !Self::location_overdue(model, requested_at) {
                debug!(?purpose, "location request already pending");
                return;
            }
            warn!(?purpose, "pending location request expired");
            model.pending_locations.remove(&purpose);
            Self::on_location(model, caps, purpose, Err(GeolocationError::Timeout));
        }
        model
            .pending_locations
            .insert(purpose, UnixTimeMs(model.view_timestamp_ms));
        caps.geolocation
            .current_position(model.config.geolocation_timeout_ms, move |result| {
                Event::LocationResolved { purpose, result }
            });
    }

    fn resolve_address(model: &mut Model, caps: &Capabilities, at: Coordinate) {
        let Ok(endpoints) = Endpoints::from_config(&model.config) else {
            model.location.address = Some(at.to_display_string());
            return;
        };
        caps.http
            .get(endpoints.reverse_geocode(at))
            .expect_json::<ReverseGeocodeResponse>()
            .send(move |result| Event::AddressResolved {
                at,
                result: Box::new(result),
            });
    }

    fn open_chat(model: &mut Model, caps: &Capabilities) {
        if model.session.is_none() {
            model.set_error(sign_in_required());
            return;
        }
        if model.chat.is_open() {
            debug!("chat already open");
            return;
        }

        let subscription = SubscriptionId::generate();
        model.chat = ChatSession::new(model.config.max_chat_messages);
        model.chat.subscription = Some(subscription.clone());
        info!(%subscription, "chat opened");

        caps.realtime.subscribe(
            subscription.clone(),
            model.config.realtime_event.clone(),
            |subscription, result| Event::ChannelDelivery {
                subscription,
                result,
            },
        );

        if let Some(endpoints) = Self::endpoints(model) {
            caps.http
                .get(endpoints.chat_history())
                .expect_json::<Vec<Value>>()
                .send(move |result| Event::HistoryLoaded {
                    subscription,
                    result: Box::new(result),
                });
        }
    }

    fn release_chat(model: &mut Model, caps: &Capabilities) {
        if let Some(subscription) = model.chat.subscription.take() {
            info!(%subscription, "chat closed");
            caps.realtime
                .unsubscribe(subscription, |subscription, result| Event::ChannelReleased {
                    subscription,
                    result,
                });
        }
        model.chat = ChatSession::new(model.config.max_chat_messages);
    }

    /// Appends locally, then publishes. A failed publish takes the message back.
    fn publish_text(model: &mut Model, caps: &Capabilities, text: String) -> bool {
        if let Err(e) = ensure_chat_open(model) {
            model.set_error(e);
            return false;
        }
        let Some(user) = model.session.clone() else {
            return false;
        };

        let message = ChatMessage::compose(&user, text, UnixTimeMs::now());
        let envelope = ChatEnvelope {
            message,
            sender: ChatSender::from(&user),
        };
        let payload = match envelope.encode() {
            Ok(payload) => payload,
            Err(e) => {
                model.set_error(e.into());
                return false;
            }
        };

        let id = envelope.message.id.clone();
        model.chat.log.append(envelope);
        model.chat.pending_publishes.insert(id.clone());
        debug!(message_id = %id, "publishing chat message");

        caps.realtime
            .publish(model.config.realtime_event.clone(), payload, move |result| {
                Event::MessagePublished { id, result }
            });
        true
    }

    fn persist_session(user: &AuthenticatedUser, model: &mut Model, caps: &Capabilities) {
        match SessionRecord::new(user.clone()).to_bytes() {
            Ok(bytes) => caps.kv.set(KvKey::session().raw(), bytes, Event::SessionSaved),
            Err(e) => {
                warn!(error = %e, "session could not be encoded");
                model.set_error(
                    AppError::new(ErrorKind::Storage, "Could not save session")
                        .with_internal(e.to_string()),
                );
            }
        }
    }

    fn apply_config(model: &mut Model, config: CoreConfig) -> Result<(), ConfigError> {
        config.validate()?;
        Endpoints::from_config(&config)?;

        if config.max_chat_messages != model.config.max_chat_messages && !model.chat.is_open() {
            model.chat = ChatSession::new(config.max_chat_messages);
        }
        if model.location.current.is_none() {
            model.map = MapState::for_config(&config);
        }
        info!(
            api_base_url = %config.api_base_url,
            completion_policy = ?config.completion_policy,
            "configuration applied"
        );
        model.config = config;
        Ok(())
    }

    /// Reports a store failure. A request missing locally means the listing
    /// is out of date, so it is fetched again.
    fn store_failed(model: &mut Model, caps: &Capabilities, e: StoreError) {
        let missing = matches!(e, StoreError::NotFound { .. });
        model.set_error(e.into());
        if missing {
            Self::fetch_requests(model, caps);
        }
    }

    #[instrument(skip_all, fields(request_id = %id))]
    fn accept(model: &mut Model, id: &RequestId) -> Result<(), StoreError> {
        let name = model.store.accept(id).map(|r| r.name.clone()).map_err(|e| {
            warn!(error = %e, "accept rejected");
            e
        })?;
        debug!(%name, "accepted from dashboard");
        model.show_notice(NOTICE_ACCEPTED, NoticeKind::Success);
        Ok(())
    }

    #[instrument(skip_all, fields(request_id = %id))]
    fn complete(model: &mut Model, id: &RequestId) -> Result<(), StoreError> {
        let policy = model.config.completion_policy;
        let removed = model.store.complete_with(id, policy).map_err(|e| {
            warn!(error = %e, "complete rejected");
            e
        })?;
        info!(removed = removed.is_some(), ?policy, "rescue completed");
        model.prune_dangling();
        model.show_notice(NOTICE_COMPLETED, NoticeKind::Success);
        Ok(())
    }

    fn on_requests_loaded(model: &mut Model, result: HttpOutcome<Vec<Value>>) {
        model.is_loading = false;
        match into_body(result) {
            Ok(items) => {
                let received = items.len();
                let records: Vec<IntakeRecord> = decode_each(items, "intake_record");
                let kept = model
                    .store
                    .replace_all(records.into_iter().filter_map(IntakeRecord::into_request));
                model.requests_loaded = true;
                model.prune_dangling();
                info!(received, kept, "rescue requests loaded");
            }
            Err(e) => {
                warn!(error = %e, "rescue requests could not be loaded");
                model.set_error(e.into());
            }
        }
    }

    fn on_location(
        model: &mut Model,
        caps: &Capabilities,
        purpose: LocationPurpose,
        result: Result<Coordinate, GeolocationError>,
    ) {
        match (purpose, result) {
            (LocationPurpose::CenterMap, Ok(at)) => {
                info!(lat = at.lat(), lon = at.lon(), "current location resolved");
                model.location = LocationState {
                    current: Some(at),
                    address: None,
                    is_fallback: false,
                };
                model.map.center = at;
                Self::resolve_address(model, caps, at);
            }
            (LocationPurpose::CenterMap, Err(e)) => {
                warn!(error = %e, "falling back to default location");
                model.use_fallback_location();
                let notice = if e == GeolocationError::Unsupported {
                    NOTICE_LOCATION_UNSUPPORTED
                } else {
                    NOTICE_LOCATION_FALLBACK
                };
                model.show_notice(notice, NoticeKind::Warning);
            }
            (LocationPurpose::ShareInChat, Ok(at)) => {
                let text = format!("My current location: {}, {}", at.lat(), at.lon());
                if Self::publish_text(model, caps, text) {
                    model.show_notice(NOTICE_LOCATION_SHARED, NoticeKind::Success);
                }
            }
            (LocationPurpose::ShareInChat, Err(e)) => {
                warn!(error = %e, "location not shared");
                model.show_notice(NOTICE_SHARE_FAILED, NoticeKind::Error);
            }
        }
    }

    fn on_session_loaded(model: &mut Model, caps: &Capabilities, result: KvOutcome) {
        match result {
            Ok(Some(bytes)) => match SessionRecord::from_bytes(&bytes) {
                Ok(record) => {
                    if model.session.is_none() {
                        info!(user_id = %record.user.id, "session restored");
                        model.session = Some(record.user);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "discarding unreadable session");
                    caps.kv.delete(KvKey::session().raw(), Event::SessionCleared);
                }
            },
            Ok(None) => debug!("no saved session"),
            Err(e) => {
                warn!(error = %e, "session could not be read");
                model.set_error(KvError::from(e).into());
            }
        }
    }
}

fn config_error(e: ConfigError) -> AppError {
    AppError::new(ErrorKind::Configuration, "Invalid configuration").with_internal(e.to_string())
}

fn sign_in_required() -> AppError {
    AppError::new(ErrorKind::Validation, "Please sign in to use the team chat")
}

fn chat_closed() -> AppError {
    AppError::new(ErrorKind::Validation, "Open the team chat to send messages")
}

fn ensure_chat_open(model: &Model) -> AppResult<()> {
    if model.session.is_none() {
        return Err(sign_in_required());
    }
    if !model.chat.is_open() {
        return Err(chat_closed());
    }
    Ok(())
}

impl CruxApp for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        model.update_timestamp();

        let span = debug_span!("update", event = event.name());
        let _entered = span.enter();

        if event.is_user_initiated() {
            model.clear_error();
        }

        match event {
            Event::AppStarted => {
                caps.kv.get(KvKey::session().raw(), Event::SessionLoaded);
                Self::fetch_requests(model, caps);
                Self::request_location(model, caps, LocationPurpose::CenterMap);
                caps.render.render();
            }

            Event::Configure(config) => {
                if let Err(e) = Self::apply_config(model, *config) {
                    warn!(error = %e, "configuration rejected");
                    model.set_error(config_error(e));
                }
                caps.render.render();
            }

            Event::SignedIn(user) => {
                match user.validate() {
                    Ok(()) => {
                        info!(user_id = %user.id, "signed in");
                        Self::persist_session(&user, model, caps);
                        model.session = Some(user);
                        model.show_notice(NOTICE_SIGNED_IN, NoticeKind::Success);
                    }
                    Err(e) => {
                        warn!(error = %e, "sign-in rejected");
                        model.set_error(AppError::new(ErrorKind::Validation, e.to_string()));
                    }
                }
                caps.render.render();
            }

            Event::SignOut => {
                Self::release_chat(model, caps);
                if let Some(user) = model.session.take() {
                    info!(user_id = %user.id, "signed out");
                }
                caps.kv.delete(KvKey::session().raw(), Event::SessionCleared);
                model.show_notice(NOTICE_SIGNED_OUT, NoticeKind::Info);
                caps.render.render();
            }

            Event::RefreshRequests => {
                Self::fetch_requests(model, caps);
                caps.render.render();
            }

            Event::SearchChanged(query) => {
                model.search_query = query;
                caps.render.render();
            }

            Event::RequestSelected(id) => {
                match model.store.get(&id).map(|r| r.location) {
                    Some(at) => {
                        model.map = MapState {
                            center: at,
                            zoom: model.config.focus_zoom,
                        };
                        model.selected = Some(id);
                    }
                    None => Self::store_failed(model, caps, StoreError::NotFound { id }),
                }
                caps.render.render();
            }

            Event::SelectionCleared => {
                model.selected = None;
                caps.render.render();
            }

            Event::AcceptRequested(id) => {
                if let Err(e) = Self::accept(model, &id) {
                    Self::store_failed(model, caps, e);
                }
                caps.render.render();
            }

            Event::CompleteRequested(id) => {
                if let Err(e) = Self::complete(model, &id) {
                    Self::store_failed(model, caps, e);
                }
                caps.render.render();
            }

            Event::DirectionsRequested(id) => {
                match model.store.get(&id).map(|r| r.location) {
                    Some(to) => {
                        let route = directions(model.origin(), to);
                        debug!(request_id = %id, length_km = route.length_km(), "route computed");
                        model.route = Some(ActiveRoute { target: id, route });
                        model.show_notice(NOTICE_DIRECTIONS, NoticeKind::Success);
                    }
                    None => Self::store_failed(model, caps, StoreError::NotFound { id }),
                }
                caps.render.render();
            }

            Event::RouteCleared => {
                model.route = None;
                caps.render.render();
            }

            Event::CallRequested(id) => {
                match model.store.get(&id).map(|r| r.phone.clone()) {
                    Some(phone) => {
                        model.show_notice(format!("Calling {phone}..."), NoticeKind::Info);
                    }
                    None => Self::store_failed(model, caps, StoreError::NotFound { id }),
                }
                caps.render.render();
            }

            Event::LocateMe => {
                Self::request_location(model, caps, LocationPurpose::CenterMap);
                caps.render.render();
            }

            Event::ChatOpened => {
                Self::open_chat(model, caps);
                caps.render.render();
            }

            Event::ChatClosed => {
                Self::release_chat(model, caps);
                caps.render.render();
            }

            Event::SendMessage(text) => {
                let text = text.trim();
                if text.is_empty() {
                    debug!("blank message ignored");
                } else {
                    Self::publish_text(model, caps, text.to_string());
                }
                caps.render.render();
            }

            Event::ShareLocationRequested => {
                match ensure_chat_open(model) {
                    Ok(()) => Self::request_location(model, caps, LocationPurpose::ShareInChat),
                    Err(e) => model.set_error(e),
                }
                caps.render.render();
            }

            Event::NoticeDismissed => {
                model.clear_notice();
                caps.render.render();
            }

            Event::ErrorDismissed => {
                caps.render.render();
            }

            Event::RequestsLoaded(result) => {
                Self::on_requests_loaded(model, *result);
                caps.render.render();
            }

            Event::HistoryLoaded {
                subscription,
                result,
            } => {
                if !model.chat.is_current(&subscription) {
                    debug!(%subscription, "history for released subscription ignored");
                    return;
                }
                model.chat.history_loaded = true;
                match into_body(*result) {
                    Ok(items) => {
                        let envelopes: Vec<ChatEnvelope> = decode_each(items, "chat_envelope");
                        let added = model.chat.log.extend(envelopes);
                        info!(%subscription, added, "chat history loaded");
                    }
                    Err(e) => {
                        warn!(%subscription, error = %e, "chat history unavailable");
                        model.set_error(e.into());
                    }
                }
                caps.render.render();
            }

            Event::AddressResolved { at, result } => {
                if model.location.current != Some(at) {
                    debug!("address for superseded location ignored");
                    return;
                }
                let address = match into_body(*result) {
                    Ok(ReverseGeocodeResponse {
                        display_name: Some(name),
                    }) if !name.trim().is_empty() => name,
                    Ok(_) => at.to_display_string(),
                    Err(e) => {
                        debug!(error = %e, "reverse geocoding failed");
                        at.to_display_string()
                    }
                };
                model.location.address = Some(address);
                caps.render.render();
            }

            Event::LocationResolved { purpose, result } => {
                let Some(requested_at) = model.pending_locations.remove(&purpose) else {
                    debug!(?purpose, "unsolicited location fix ignored");
                    return;
                };

                let result = if Self::location_overdue(model, requested_at) {
                    warn!(?purpose, "location fix arrived after the deadline");
                    Err(GeolocationError::Timeout)
                } else {
                    result.and_then(|fix| {
                        fix.coordinate()
                            .map_err(|e| GeolocationError::PositionUnavailable {
                                reason: e.to_string(),
                            })
                    })
                };

                Self::on_location(model, caps, purpose, result);
                caps.render.render();
            }

            Event::ChannelDelivery {
                subscription,
                result,
            } => {
                if !model.chat.is_current(&subscription) {
                    debug!(%subscription, "delivery for released subscription ignored");
                    return;
                }
                match result {
                    Ok(RealtimeOutput::Message { payload }) => {
                        if model.chat.log.receive(&payload) == Some(Append::Added) {
                            caps.render.render();
                        }
                    }
                    Ok(other) => debug!(?other, "unexpected subscription output"),
                    Err(e) => {
                        warn!(%subscription, error = %e, "realtime subscription error");
                        model.show_notice(NOTICE_CHAT_DISCONNECTED, NoticeKind::Warning);
                        caps.render.render();
                    }
                }
            }

            Event::MessagePublished { id, result } => {
                model.chat.pending_publishes.remove(&id);
                if let Err(e) = result {
                    let error: AppError = TransportError::from(e).into();
                    warn!(message_id = %id, error = %error, "publish failed, message withdrawn");
                    model.chat.log.retract(&id);
                    model.show_notice(NOTICE_MESSAGE_NOT_SENT, NoticeKind::Error);
                } else {
                    debug!(message_id = %id, "message published");
                }
                caps.render.render();
            }

            Event::ChannelReleased {
                subscription,
                result,
            } => match result {
                Ok(_) => debug!(%subscription, "subscription released"),
                Err(e) => warn!(%subscription, error = %e, "subscription release failed"),
            },

            Event::SessionLoaded(result) => {
                Self::on_session_loaded(model, caps, result);
                caps.render.render();
            }

            Event::SessionSaved(result) | Event::SessionCleared(result) => {
                if let Err(e) = result {
                    warn!(error = %e, "session storage failed");
                    model.set_error(KvError::from(e).into());
                    caps.render.render();
                }
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        let now_ms = model.view_timestamp_ms;
        let origin = model.origin();
        let selected_id = model.selected.as_ref().map(RequestId::as_str);

        let requests = model
            .store
            .query(&model.search_query)
            .into_iter()
            .map(|r| RequestListItem::build(r, origin))
            .collect();

        let pins = model
            .store
            .iter()
            .map(|r| MapPin::build(r, selected_id))
            .collect();

        let selected = model
            .selected
            .as_ref()
            .and_then(|id| model.store.get(id))
            .map(|r| RequestDetail::build(r, origin));

        ViewModel {
            session: model.session.as_ref().map(SessionView::from),
            location: LocationView {
                lat: origin.lat(),
                lon: origin.lon(),
                address: model.location.address.clone(),
                is_fallback: model.location.is_fallback,
                is_locating: model
                    .pending_locations
                    .contains_key(&LocationPurpose::CenterMap),
            },
            map: MapView {
                center_lat: model.map.center.lat(),
                center_lon: model.map.center.lon(),
                zoom: model.map.zoom,
                pins,
                route: model.route.as_ref().map(RouteView::from),
            },
            search_query: model.search_query.clone(),
            requests,
            requests_loaded: model.requests_loaded,
            selected,
            accepted: accepted_items(&model.store, origin),
            stats: RequestStats {
                total: model.store.len(),
                waiting: model.store.count_by_status(RequestStatus::Waiting),
                accepted: model.store.count_by_status(RequestStatus::Accepted),
            },
            chat: ChatView::build(&model.chat, model.session.as_ref(), now_ms),
            notice: model
                .notice
                .as_ref()
                .filter(|n| !n.is_expired(now_ms))
                .map(NoticeView::from),
            error: model.active_error.as_ref().map(UserFacingError::from),
            is_loading: model.is_loading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_location;
    use crate::request::{Priority, RescueRequest};

    fn seeded_model() -> Model {
        let mut model = Model::default();
        let at = Coordinate::new(10.7859, 106.6960).unwrap();
        model.store.replace_all(vec![
            RescueRequest::new("1", "Nguyen Van A", "0901234567", at, Priority::High),
            RescueRequest::new("2", "Tran Thi B", "0901234568", at, Priority::Low)
                .with_status(RequestStatus::Rescued),
        ]);
        model
    }

    #[test]
    fn view_offers_actions_per_status() {
        let mut model = seeded_model();
        model.selected = Some(RequestId::new("1"));
        let view = App.view(&model);
        let detail = view.selected.unwrap();
        assert_eq!(detail.item.distance_text, "1.13 km");
        assert!(detail.actions.contains(&crate::view::RequestAction::Accept));
        assert_eq!(view.stats.waiting, 1);
        assert_eq!(view.location.lat, default_location().lat());
    }

    #[test]
    fn search_filters_list_but_not_pins() {
        let mut model = seeded_model();
        model.search_query = "tran".into();
        let view = App.view(&model);
        assert_eq!(view.requests.len(), 1);
        assert_eq!(view.requests[0].id, "2");
        assert_eq!(view.map.pins.len(), 2);
    }

    #[test]
    fn accept_and_complete_helpers_set_notices() {
        let mut model = seeded_model();
        App::accept(&mut model, &RequestId::new("1")).unwrap();
        assert_eq!(model.notice.as_ref().unwrap().message, NOTICE_ACCEPTED);

        let again = App::accept(&mut model, &RequestId::new("1"));
        assert!(matches!(again, Err(StoreError::InvalidTransition { .. })));

        App::complete(&mut model, &RequestId::new("1")).unwrap();
        assert!(!model.store.contains(&RequestId::new("1")));
        assert_eq!(model.notice.as_ref().unwrap().message, NOTICE_COMPLETED);
    }
}
