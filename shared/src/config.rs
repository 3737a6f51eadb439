use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::chat::DEFAULT_MAX_CHAT_MESSAGES;
use crate::geo::Coordinate;
use crate::store::CompletionPolicy;

pub const DEFAULT_API_BASE_URL: &str = "https://chiquoc26.id.vn/api/";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const DEFAULT_REALTIME_EVENT: &str = "message";
pub const DEFAULT_GEOLOCATION_TIMEOUT_MS: u64 = 10_000;
pub const MAX_GEOLOCATION_TIMEOUT_MS: u64 = 120_000;
/// Ho Chi Minh City, used whenever the device cannot tell us where we are.
pub const DEFAULT_LOCATION: (f64, f64) = (10.7769, 106.7009);
pub const DEFAULT_MAP_ZOOM: f64 = 13.0;
pub const FOCUS_MAP_ZOOM: f64 = 15.0;
pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} is not a valid http(s) url: {reason}")]
    InvalidUrl { field: &'static str, reason: String },
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("realtime event name must not be empty")]
    EmptyEventName,
    #[error("could not parse configuration: {0}")]
    Parse(String),
}

/// Runtime settings handed over by the shell at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub api_base_url: String,
    pub geocoder_url: String,
    pub realtime_event: String,
    pub geolocation_timeout_ms: u64,
    pub default_location: Coordinate,
    pub completion_policy: CompletionPolicy,
    pub max_chat_messages: usize,
    pub default_zoom: f64,
    pub focus_zoom: f64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            realtime_event: DEFAULT_REALTIME_EVENT.to_string(),
            geolocation_timeout_ms: DEFAULT_GEOLOCATION_TIMEOUT_MS,
            default_location: default_location(),
            completion_policy: CompletionPolicy::Lenient,
            max_chat_messages: DEFAULT_MAX_CHAT_MESSAGES,
            default_zoom: DEFAULT_MAP_ZOOM,
            focus_zoom: FOCUS_MAP_ZOOM,
        }
    }
}

#[must_use]
pub fn default_location() -> Coordinate {
    Coordinate::from_trusted(DEFAULT_LOCATION.0, DEFAULT_LOCATION.1)
}

impl CoreConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_http_url("api_base_url", &self.api_base_url)?;
        parse_http_url("geocoder_url", &self.geocoder_url)?;

        if self.realtime_event.trim().is_empty() {
            return Err(ConfigError::EmptyEventName);
        }

        if self.geolocation_timeout_ms == 0 || self.geolocation_timeout_ms > MAX_GEOLOCATION_TIMEOUT_MS {
            return Err(ConfigError::OutOfRange {
                field: "geolocation_timeout_ms",
                min: 1.0,
                max: MAX_GEOLOCATION_TIMEOUT_MS as f64,
                value: self.geolocation_timeout_ms as f64,
            });
        }

        if self.max_chat_messages == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_chat_messages",
                min: 1.0,
                max: f64::MAX,
                value: self.max_chat_messages as f64,
            });
        }

        for (field, zoom) in [("default_zoom", self.default_zoom), ("focus_zoom", self.focus_zoom)] {
            if !zoom.is_finite() || !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
                return Err(ConfigError::OutOfRange {
                    field,
                    min: MIN_ZOOM,
                    max: MAX_ZOOM,
                    value: zoom,
                });
            }
        }

        Ok(())
    }
}

pub(crate) fn parse_http_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl {
            field,
            reason: format!("scheme '{}' is not allowed", url.scheme()),
        });
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            field,
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(CoreConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = CoreConfig::from_json(
            r#"{"api_base_url": "https://rescue.example.org/api/", "completion_policy": "strict"}"#,
        )
        .unwrap();
        assert_eq!(config.api_base_url, "https://rescue.example.org/api/");
        assert_eq!(config.completion_policy, CompletionPolicy::Strict);
        assert_eq!(config.realtime_event, DEFAULT_REALTIME_EVENT);
        assert_eq!(config.default_location, default_location());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            CoreConfig::from_json(r#"{"api_base_url": "ftp://files.example.org"}"#),
            Err(ConfigError::InvalidUrl { field: "api_base_url", .. })
        ));
        assert!(matches!(
            CoreConfig::from_json(r#"{"geolocation_timeout_ms": 0}"#),
            Err(ConfigError::OutOfRange { field: "geolocation_timeout_ms", .. })
        ));
        assert!(matches!(
            CoreConfig::from_json(r#"{"realtime_event": "  "}"#),
            Err(ConfigError::EmptyEventName)
        ));
        assert!(matches!(
            CoreConfig::from_json(r#"{"default_location": [95.0, 0.0]}"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
