//! Satellite identity and the shared-broker filter

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Opaque identifier of one physical satellite
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SatelliteId(String);

impl SatelliteId {
    /// Create a satellite identity
    ///
    /// # Errors
    ///
    /// Returns error if the identity is empty
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::Config("satellite id must not be empty".to_string()));
        }
        Ok(Self(id))
    }

    /// Use the machine hostname as identity
    ///
    /// # Errors
    ///
    /// Returns error if the hostname cannot be read or is not valid UTF-8
    pub fn from_hostname() -> Result<Self> {
        let name = hostname::get()?
            .into_string()
            .map_err(|_| Error::Config("hostname is not valid UTF-8".to_string()))?;
        Self::new(name)
    }

    /// Identity as string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SatelliteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a message tagged `message` is meant for the satellite `configured`
///
/// Exact match only: no wildcard, no case folding, no trimming.
#[must_use]
pub fn accepts(configured: &SatelliteId, message: &SatelliteId) -> bool {
    configured.0 == message.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SatelliteId {
        SatelliteId::new(s).unwrap()
    }

    #[test]
    fn accepts_same_identity() {
        assert!(accepts(&id("kitchen"), &id("kitchen")));
    }

    #[test]
    fn rejects_other_identity() {
        assert!(!accepts(&id("kitchen"), &id("living_room")));
    }

    #[test]
    fn comparison_is_case_sensitive() {
        assert!(!accepts(&id("kitchen"), &id("Kitchen")));
        assert!(!accepts(&id("kitchen"), &id("kitchen ")));
    }

    #[test]
    fn empty_identity_is_rejected() {
        assert!(matches!(SatelliteId::new(""), Err(Error::Config(_))));
    }

    #[test]
    fn deserialized_empty_identity_never_matches() {
        let empty: SatelliteId = serde_json::from_str("\"\"").unwrap();
        assert!(!accepts(&id("kitchen"), &empty));
    }
}
