use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::config::{parse_http_url, ConfigError, CoreConfig};
use crate::error::TransportError;
use crate::geo::Coordinate;

pub const MAX_URL_LENGTH: usize = 2048;

const LISTING_PATH: &str = "list";
const CHAT_HISTORY_PATH: &str = "chats/";

/// Service URLs resolved from a [`CoreConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    listing: Url,
    chat_history: Url,
    geocoder: Url,
}

impl Endpoints {
    pub fn from_config(config: &CoreConfig) -> Result<Self, ConfigError> {
        let mut base = parse_http_url("api_base_url", &config.api_base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let join = |path: &str| {
            base.join(path).map_err(|e| ConfigError::InvalidUrl {
                field: "api_base_url",
                reason: e.to_string(),
            })
        };

        let endpoints = Self {
            listing: join(LISTING_PATH)?,
            chat_history: join(CHAT_HISTORY_PATH)?,
            geocoder: parse_http_url("geocoder_url", &config.geocoder_url)?,
        };

        for url in [&endpoints.listing, &endpoints.chat_history, &endpoints.geocoder] {
            if url.as_str().len() > MAX_URL_LENGTH {
                return Err(ConfigError::InvalidUrl {
                    field: "api_base_url",
                    reason: format!("URL exceeds maximum length of {MAX_URL_LENGTH} bytes"),
                });
            }
        }

        Ok(endpoints)
    }

    #[must_use]
    pub fn listing(&self) -> &str {
        self.listing.as_str()
    }

    #[must_use]
    pub fn chat_history(&self) -> &str {
        self.chat_history.as_str()
    }

    #[must_use]
    pub fn reverse_geocode(&self, at: Coordinate) -> String {
        let mut url = self.geocoder.clone();
        url.query_pairs_mut()
            .append_pair("format", "jsonv2")
            .append_pair("lat", &at.lat().to_string())
            .append_pair("lon", &at.lon().to_string());
        url.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseGeocodeResponse {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Flattens a crux_http result into the body or a [`TransportError`].
pub fn into_body<T>(result: crux_http::Result<crux_http::Response<T>>) -> Result<T, TransportError> {
    let mut response = result.map_err(transport_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            status: u16::from(status),
        });
    }
    response.take_body().ok_or(TransportError::EmptyBody)
}

/// Decodes a JSON array item by item. Items that do not decode are logged and
/// skipped so one bad record does not hide the rest.
pub fn decode_each<T: DeserializeOwned>(items: Vec<Value>, kind: &'static str) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(kind, index, error = %e, "skipping undecodable item");
                None
            }
        })
        .collect()
}

fn transport_error(e: crux_http::Error) -> TransportError {
    match e {
        crux_http::Error::Http(http) => TransportError::Status {
            status: u16::from(http.code),
        },
        crux_http::Error::Json(reason) => TransportError::Decode(reason),
        other => TransportError::Request(other.to_string()),
    }
}

pub(crate) fn truncate_url(url: &str) -> String {
    if url.len() <= 100 {
        url.to_string()
    } else {
        let cut = (0..=100).rev().find(|i| url.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &url[..cut])
    }
}
