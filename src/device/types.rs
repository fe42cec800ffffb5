//! Device, binding, home and member records

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Registered identity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Reachable only through a master's binding
    #[default]
    Normal,

    /// Owns a direct network binding and a public key
    Master,
}

impl DeviceType {
    /// Stored column value
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Normal => 0,
            Self::Master => 1,
        }
    }

    /// Parse the stored column value
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        if code == 1 { Self::Master } else { Self::Normal }
    }
}

/// Lifecycle status shared by identities, devices, homes and members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Frozen,
    Active,
}

impl Status {
    /// Stored column value
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Frozen => 0,
            Self::Active => 1,
        }
    }

    /// Parse the stored column value; anything but active counts as frozen
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        if code == 1 { Self::Active } else { Self::Frozen }
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Frozen => write!(f, "frozen"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// Role of a user inside a home
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberType {
    #[default]
    Normal,
    Owner,
}

impl MemberType {
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Normal => 0,
            Self::Owner => 1,
        }
    }

    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        if code == 1 { Self::Owner } else { Self::Normal }
    }
}

/// Device identity keyed by (sub-domain, device id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasicInfo {
    pub sub_domain: String,
    pub device_id: String,
    pub device_type: DeviceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    pub status: Status,
}

impl BasicInfo {
    #[must_use]
    pub fn is_master(&self) -> bool {
        self.device_type == DeviceType::Master
    }

    /// Check structural invariants
    ///
    /// The natural key must be non-empty, a master must carry a non-empty
    /// public key and a normal device must carry none at all.
    #[must_use]
    pub fn validate(&self) -> bool {
        if self.sub_domain.is_empty() || self.device_id.is_empty() {
            return false;
        }
        match self.device_type {
            DeviceType::Master => self.public_key.as_deref().is_some_and(|k| !k.is_empty()),
            DeviceType::Normal => self.public_key.is_none(),
        }
    }
}

/// Mapping between a numeric did and the physical network key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingInfo {
    pub did: i64,
    pub sub_domain: String,
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_time: Option<DateTime<Utc>>,
}

/// Bound device placement; `master_did == did` marks a master
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub did: i64,
    pub hid: i64,
    pub name: String,
    pub status: Status,
    pub master_did: i64,
}

impl DeviceInfo {
    #[must_use]
    pub const fn is_master(&self) -> bool {
        self.master_did == self.did
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Home {
    pub hid: i64,
    pub name: String,
    pub create_uid: i64,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub uid: i64,
    pub hid: i64,
    pub name: String,
    pub member_type: MemberType,
    pub status: Status,
}

/// Physical endpoint that should receive commands for a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessPoint {
    pub sub_domain: String,
    pub device_id: String,
}

/// Parse a stored RFC 3339 timestamp; unparseable values are logged and dropped
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(value = s, error = %e, "unparseable stored timestamp");
            None
        }
    }
}
