#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod capabilities;
pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod geo;
pub mod model;
pub mod projection;
pub mod request;
pub mod session;
pub mod store;
pub mod view;

use serde::{Deserialize, Serialize};

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use crux_core::{render::Render, App as CruxApp};
pub use error::{AppError, AppResult, ErrorKind, ErrorSeverity};
pub use event::Event;
pub use model::Model;
pub use store::{CompletionPolicy, RescueStore};
pub use view::ViewModel;

/// Slack on top of the configured geolocation timeout before a late fix is
/// treated as a timeout.
pub const LOCATION_TIMEOUT_GRACE_MS: u64 = 2_000;

/// Unix timestamp in milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub fn now() -> Self {
        Self(get_current_time_ms())
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0 / 1000
    }
}

#[must_use]
pub fn get_current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[must_use]
pub fn format_time_ago(timestamp_ms: u64, now_ms: u64) -> String {
    if timestamp_ms > now_ms {
        let future_diff_secs = (timestamp_ms.saturating_sub(now_ms)) / 1000;
        return if future_diff_secs < 60 {
            "Just now".into()
        } else {
            "Upcoming".into()
        };
    }

    let diff_secs = now_ms.saturating_sub(timestamp_ms) / 1000;

    if diff_secs < 5 {
        return "Just now".into();
    }
    if diff_secs < 60 {
        return format!("{diff_secs}s ago");
    }

    let diff_mins = diff_secs / 60;
    if diff_mins < 60 {
        return format!("{diff_mins}m ago");
    }

    let diff_hours = diff_mins / 60;
    if diff_hours < 24 {
        return format!("{diff_hours}h ago");
    }

    let diff_days = diff_hours / 24;
    if diff_days < 7 {
        return format!("{diff_days}d ago");
    }
    if diff_days < 30 {
        return format!("{}w ago", diff_days / 7);
    }
    if diff_days < 365 {
        return format!("{}mo ago", diff_days / 30);
    }

    format!("{}y ago", diff_days / 365)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_ago_just_now() {
        assert_eq!(format_time_ago(1000, 1000), "Just now");
        assert_eq!(format_time_ago(1000, 4999), "Just now");
        assert_eq!(format_time_ago(50_000, 1000), "Just now");
    }

    #[test]
    fn time_ago_buckets() {
        assert_eq!(format_time_ago(0, 30_000), "30s ago");
        assert_eq!(format_time_ago(0, 5 * 60_000), "5m ago");
        assert_eq!(format_time_ago(0, 3 * 3_600_000), "3h ago");
        assert_eq!(format_time_ago(0, 2 * 86_400_000), "2d ago");
        assert_eq!(format_time_ago(0, 14 * 86_400_000), "2w ago");
        assert_eq!(format_time_ago(0, 60 * 86_400_000), "2mo ago");
        assert_eq!(format_time_ago(0, 400 * 86_400_000), "1y ago");
    }

    #[test]
    fn time_ago_far_future_is_upcoming() {
        assert_eq!(format_time_ago(10 * 60_000, 0), "Upcoming");
    }

    #[test]
    fn unix_time_conversions() {
        let t = UnixTimeMs(90_500);
        assert_eq!(t.as_millis(), 90_500);
        assert_eq!(t.as_secs(), 90);
        assert!(UnixTimeMs::now().0 > 1_600_000_000_000);
    }
}
