use crux_core::testing::AppTester;
use crux_core::Request;
use crux_http::testing::ResponseBuilder;

use rescue_shared::capabilities::{
    GeoFix, GeolocationOperation, RealtimeOperation, ReverseGeocodeResponse,
};
use rescue_shared::error::GeolocationError;
use rescue_shared::geo::Coordinate;
use rescue_shared::model::{LocationPurpose, NoticeKind};
use rescue_shared::session::AuthenticatedUser;
use rescue_shared::{App, Effect, ErrorKind, Event, Model, UnixTimeMs};

fn geolocation_requests(effects: Vec<Effect>) -> Vec<Request<GeolocationOperation>> {
    effects
        .into_iter()
        .filter_map(|e| match e {
            Effect::Geolocation(request) => Some(request),
            _ => None,
        })
        .collect()
}

fn http_urls(effects: &[Effect]) -> Vec<String> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Http(request) => Some(request.operation.url.clone()),
            _ => None,
        })
        .collect()
}

/// Resolves a position request and feeds the result back, returning the
/// effects of that follow-up update.
fn resolve_position(
    app: &AppTester<App, Effect>,
    model: &mut Model,
    request: &mut Request<GeolocationOperation>,
    outcome: Result<GeoFix, GeolocationError>,
) -> Vec<Effect> {
    let update = app.resolve(request, outcome).expect("position resolves");
    let mut effects = Vec::new();
    for event in update.events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

fn fix(lat: f64, lon: f64) -> GeoFix {
    GeoFix {
        lat,
        lon,
        accuracy_m: Some(12.0),
    }
}

#[test]
fn located_position_recenters_map_and_resolves_address() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::LocateMe, &mut model);
    let mut requests = geolocation_requests(update.effects);
    assert_eq!(
        requests[0].operation,
        GeolocationOperation::CurrentPosition {
            timeout_ms: 10_000,
            high_accuracy: true
        }
    );
    assert!(app.view(&model).location.is_locating);

    let effects = resolve_position(&app, &mut model, &mut requests[0], Ok(fix(10.8231, 106.6297)));
    let urls = http_urls(&effects);
    assert_eq!(urls.len(), 1);
    assert!(urls[0].starts_with("https://nominatim.openstreetmap.org/reverse?format=jsonv2"));
    assert!(urls[0].contains("lat=10.8231"));

    let view = app.view(&model);
    assert!(!view.location.is_locating);
    assert!(!view.location.is_fallback);
    assert!((view.map.center_lat - 10.8231).abs() < 1e-9);

    let at = Coordinate::new(10.8231, 106.6297).unwrap();
    let body = ReverseGeocodeResponse {
        display_name: Some("Tan Binh, Ho Chi Minh City".into()),
    };
    app.update(
        Event::AddressResolved {
            at,
            result: Box::new(Ok(ResponseBuilder::ok().body(body).build())),
        },
        &mut model,
    );
    assert_eq!(
        app.view(&model).location.address.as_deref(),
        Some("Tan Binh, Ho Chi Minh City")
    );
}

#[test]
fn blank_address_falls_back_to_coordinates() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let mut requests = geolocation_requests(app.update(Event::LocateMe, &mut model).effects);
    resolve_position(&app, &mut model, &mut requests[0], Ok(fix(10.8231, 106.6297)));

    let at = Coordinate::new(10.8231, 106.6297).unwrap();
    let body = ReverseGeocodeResponse {
        display_name: Some("  ".into()),
    };
    app.update(
        Event::AddressResolved {
            at,
            result: Box::new(Ok(ResponseBuilder::ok().body(body).build())),
        },
        &mut model,
    );
    assert_eq!(
        app.view(&model).location.address.as_deref(),
        Some("10.8231, 106.6297")
    );
}

#[test]
fn denied_permission_uses_default_location() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let mut requests = geolocation_requests(app.update(Event::LocateMe, &mut model).effects);
    let effects = resolve_position(
        &app,
        &mut model,
        &mut requests[0],
        Err(GeolocationError::PermissionDenied),
    );
    assert!(http_urls(&effects).is_empty());

    let view = app.view(&model);
    assert!(view.location.is_fallback);
    assert_eq!(view.location.address.as_deref(), Some("10.7769, 106.7009"));
    let notice = view.notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::Warning);
    assert_eq!(
        notice.message,
        "Could not get your current location. Using default location."
    );
}

#[test]
fn unsupported_device_gets_its_own_message() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let mut requests = geolocation_requests(app.update(Event::LocateMe, &mut model).effects);
    resolve_position(&app, &mut model, &mut requests[0], Err(GeolocationError::Unsupported));

    assert_eq!(
        app.view(&model).notice.unwrap().message,
        "Geolocation is not supported on this device. Using default location."
    );
}

#[test]
fn out_of_range_fix_is_rejected() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let mut requests = geolocation_requests(app.update(Event::LocateMe, &mut model).effects);
    resolve_position(&app, &mut model, &mut requests[0], Ok(fix(123.0, 106.0)));

    assert!(app.view(&model).location.is_fallback);
}

#[test]
fn concurrent_locate_requests_are_coalesced() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let first = geolocation_requests(app.update(Event::LocateMe, &mut model).effects);
    let second = geolocation_requests(app.update(Event::LocateMe, &mut model).effects);
    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
}

#[test]
fn unsolicited_fix_is_ignored() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    app.update(
        Event::LocationResolved {
            purpose: LocationPurpose::CenterMap,
            result: Ok(fix(10.8231, 106.6297)),
        },
        &mut model,
    );
    assert!(model.location.current.is_none());
}

#[test]
fn share_location_needs_a_session() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let update = app.update(Event::ShareLocationRequested, &mut model);
    assert!(geolocation_requests(update.effects).is_empty());
    assert_eq!(
        model.active_error.as_ref().map(|e| e.kind),
        Some(ErrorKind::Validation)
    );
}

#[test]
fn shared_location_is_published_to_chat() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    app.update(
        Event::SignedIn(AuthenticatedUser::new("rescuer-1", "Le Van Cuu").unwrap()),
        &mut model,
    );
    app.update(Event::ChatOpened, &mut model);

    let mut requests =
        geolocation_requests(app.update(Event::ShareLocationRequested, &mut model).effects);
    let effects = resolve_position(&app, &mut model, &mut requests[0], Ok(fix(10.8, 106.7)));

    assert!(effects.iter().any(|e| matches!(
        e,
        Effect::Realtime(request) if matches!(
            &request.operation,
            RealtimeOperation::Publish { payload, .. }
                if payload.contains("My current location: 10.8, 106.7")
        )
    )));
    assert_eq!(
        app.view(&model).notice.unwrap().message,
        "Location shared successfully"
    );
    // Sharing does not move the map.
    assert!(model.location.current.is_none());
}

#[test]
fn failed_share_reports_permissions() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    app.update(
        Event::SignedIn(AuthenticatedUser::new("rescuer-1", "Le Van Cuu").unwrap()),
        &mut model,
    );
    app.update(Event::ChatOpened, &mut model);

    let mut requests =
        geolocation_requests(app.update(Event::ShareLocationRequested, &mut model).effects);
    resolve_position(
        &app,
        &mut model,
        &mut requests[0],
        Err(GeolocationError::PermissionDenied),
    );

    let notice = app.view(&model).notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::Error);
    assert_eq!(
        notice.message,
        "Could not share your location. Please check your permissions."
    );
    assert!(!model.location.is_fallback);
}

#[test]
fn fix_after_the_deadline_counts_as_timeout() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let mut requests = geolocation_requests(app.update(Event::LocateMe, &mut model).effects);
    model
        .pending_locations
        .insert(LocationPurpose::CenterMap, UnixTimeMs(0));

    let effects = resolve_position(&app, &mut model, &mut requests[0], Ok(fix(10.8231, 106.6297)));
    assert!(http_urls(&effects).is_empty());

    let view = app.view(&model);
    assert!(view.location.is_fallback);
    assert!(!view.location.is_locating);
    let notice = view.notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::Warning);
    assert_eq!(
        notice.message,
        "Could not get your current location. Using default location."
    );
}

#[test]
fn unanswered_request_expires_and_is_sent_again() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();

    let first = geolocation_requests(app.update(Event::LocateMe, &mut model).effects);
    assert_eq!(first.len(), 1);
    model
        .pending_locations
        .insert(LocationPurpose::CenterMap, UnixTimeMs(0));

    let retry = geolocation_requests(app.update(Event::LocateMe, &mut model).effects);
    assert_eq!(retry.len(), 1);

    let view = app.view(&model);
    assert!(view.location.is_fallback);
    assert!(view.location.is_locating);
    assert_eq!(view.notice.unwrap().kind, NoticeKind::Warning);
}

#[test]
fn share_location_needs_an_open_chat() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    app.update(
        Event::SignedIn(AuthenticatedUser::new("rescuer-1", "Le Van Cuu").unwrap()),
        &mut model,
    );

    let update = app.update(Event::ShareLocationRequested, &mut model);
    assert!(geolocation_requests(update.effects).is_empty());
    let error = app.view(&model).error.unwrap();
    assert_eq!(error.message, "Open the team chat to send messages");
}
