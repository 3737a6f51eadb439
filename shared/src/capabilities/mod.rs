mod geolocation;
mod http;
mod kv;
mod realtime;

pub use self::geolocation::{GeoFix, Geolocation, GeolocationOperation, GeolocationResult};
pub use self::http::{decode_each, into_body, Endpoints, ReverseGeocodeResponse, MAX_URL_LENGTH};
pub(crate) use self::http::truncate_url;
pub use self::kv::{KeyNamespace, KvError, KvKey};
pub use self::realtime::{
    Realtime, RealtimeError, RealtimeOperation, RealtimeOutput, RealtimeResult, SubscriptionId,
};

pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub kv: KeyValue<Event>,
    pub render: Render<Event>,
    pub geolocation: Geolocation<Event>,
    pub realtime: Realtime<Event>,
}
