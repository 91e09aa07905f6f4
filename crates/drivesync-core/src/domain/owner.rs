//! Owner identifier newtype

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Identifier of the account that owns an integration
///
/// Serialized as a bare JSON integer so it matches the wire format of
/// queued payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(i64);

impl OwnerId {
    /// Creates a new OwnerId
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw integer value
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for OwnerId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for OwnerId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| DomainError::InvalidOwnerId(s.to_string()))
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
