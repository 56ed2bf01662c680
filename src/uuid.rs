//! UUID functionality with fast random generation.
//!
//! Wraps `uuid::Uuid` with v4 generation backed by `fastrand`. The session
//! correlation ids this crate generates are not security sensitive, so a
//! fast non-cryptographic generator is the right trade-off.

use std::{fmt, ops::Deref, str::FromStr};

use crate::error::Error;

/// A wrapper around `uuid::Uuid`.
///
/// Implements `Deref` to `uuid::Uuid`, allowing transparent access to all
/// methods of the underlying UUID type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uuid(pub uuid::Uuid);

impl Deref for Uuid {
    type Target = uuid::Uuid;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Uuid {
    /// Generates a new random UUID v4 using a fast random number generator.
    ///
    /// Faster than a cryptographically secure generator; do not use where
    /// UUID predictability must be prevented.
    #[must_use]
    pub fn fast_v4() -> Self {
        let random_bytes = fastrand::u128(..).to_ne_bytes();
        let uuid = uuid::Builder::from_random_bytes(random_bytes).into_uuid();
        Self(uuid)
    }
}

/// Formats as 32 hexadecimal digits with hyphens:
/// `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Uuid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(Self).map_err(Into::into)
    }
}

impl From<Uuid> for uuid::Uuid {
    fn from(value: Uuid) -> Self {
        *value
    }
}

impl serde::Serialize for Uuid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
