use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::geo::Coordinate;

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(RequestId);
typed_id!(UserId);
typed_id!(MessageId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RequestStatus {
    #[default]
    Waiting,
    #[serde(rename = "In Progress", alias = "InProgress", alias = "in_progress")]
    InProgress,
    Accepted,
    Rescued,
}

impl RequestStatus {
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Waiting => "Waiting",
            Self::InProgress => "In Progress",
            Self::Accepted => "Accepted",
            Self::Rescued => "Rescued",
        }
    }

    #[must_use]
    pub const fn is_acceptable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Low,
}

impl Priority {
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Low => "Low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescueRequest {
    pub id: RequestId,
    pub name: String,
    pub phone: String,
    pub location: Coordinate,
    pub status: RequestStatus,
    pub priority: Priority,
    pub message: Option<String>,
    pub address: Option<String>,
    pub image: Option<String>,
}

impl RescueRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        phone: impl Into<String>,
        location: Coordinate,
        priority: Priority,
    ) -> Self {
        Self {
            id: RequestId::new(id),
            name: name.into(),
            phone: phone.into(),
            location,
            status: RequestStatus::Waiting,
            priority,
            message: None,
            address: None,
            image: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: RequestStatus) -> Self {
        self.status = status;
        self
    }

    /// Case-insensitive substring match on name or phone.
    #[must_use]
    pub fn matches(&self, needle_lowercase: &str) -> bool {
        needle_lowercase.is_empty()
            || self.name.to_lowercase().contains(needle_lowercase)
            || self.phone.to_lowercase().contains(needle_lowercase)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl From<RawId> for RequestId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => RequestId(s),
            RawId::Number(n) => RequestId(n.to_string()),
        }
    }
}

/// One item of the intake listing response.
#[derive(Debug, Clone, Deserialize)]
pub struct IntakeRecord {
    id: RawId,
    name: String,
    #[serde(default)]
    phone: String,
    location: (f64, f64),
    #[serde(default)]
    status: RequestStatus,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

impl IntakeRecord {
    /// Records with an unusable coordinate are dropped.
    #[must_use]
    pub fn into_request(self) -> Option<RescueRequest> {
        let id = RequestId::from(self.id);
        let location = match Coordinate::new(self.location.0, self.location.1) {
            Ok(c) => c,
            Err(e) => {
                warn!(request_id = %id, error = %e, "dropping intake record with invalid location");
                return None;
            }
        };

        Some(RescueRequest {
            id,
            name: self.name,
            phone: self.phone,
            location,
            status: self.status,
            priority: self.priority,
            message: self.message.filter(|m| !m.trim().is_empty()),
            address: self.address.filter(|a| !a.trim().is_empty()),
            image: self.image,
        })
    }
}
