//! Ephemeral device identity.
//!
//! Every resolution call presents itself to the sync service as a fresh
//! virtual web device. The identity is generated per call and discarded
//! with it; nothing is persisted. Collisions are harmless because sessions
//! are keyed by account credential, not by device id: a collision merely
//! looks like a different device joining.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Identifier a device presents to the sync service.
///
/// Sixteen lowercase ASCII letters, drawn from a fast non-cryptographic
/// generator.
#[derive(Clone, Default, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize, Debug, Hash)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Length of a device id in characters.
    pub const LENGTH: usize = 16;

    /// Generates a fresh random device id.
    #[must_use]
    pub fn random() -> Self {
        let id = (0..Self::LENGTH).map(|_| fastrand::lowercase()).collect();
        Self(id)
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of device, as the numeric code used in the handshake.
///
/// The state announcement uses a string form instead; see
/// [`DeviceKind::wire_name`].
#[derive(
    Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Deserialize_repr, Serialize_repr, Debug,
    Hash,
)]
#[repr(u8)]
pub enum DeviceKind {
    /// A web client.
    #[default]
    Web = 1,
}

impl DeviceKind {
    /// The string form the sync protocol uses in device state blocks.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Web => "WEB",
        }
    }
}

/// Application descriptor sent in the handshake, JSON-encoded into the
/// `Ynison-Device-Info` key.
#[derive(Clone, Eq, PartialEq, Deserialize, Serialize, Debug, Hash)]
pub struct DeviceInfo {
    pub app_name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            app_name: Device::APP_NAME.to_owned(),
            kind: DeviceKind::Web,
        }
    }
}

/// The full ephemeral identity for one resolution call.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Device {
    pub id: DeviceId,
    pub info: DeviceInfo,
}

impl Device {
    /// Application name the virtual device reports.
    pub const APP_NAME: &'static str = "Chrome";

    /// Human-readable title the virtual device reports in state blocks.
    pub const TITLE: &'static str = "Chrome Browser";

    /// Generates a fresh identity.
    ///
    /// No side effects and no failure modes.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            id: DeviceId::random(),
            info: DeviceInfo::default(),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.info.app_name)
    }
}
