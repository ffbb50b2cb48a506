//! Destination records and their identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

use super::location::Location;
use crate::error::{Error, Result};

/// Maximum accepted length of a destination id
pub const MAX_DESTINATION_ID_LEN: usize = 64;

/// Opaque destination identifier
///
/// Ids arrive from the outside world inside notifications, so construction
/// goes through [`DestinationId::parse`]. Accepted: 1 to 64 characters of
/// ASCII alphanumerics, `-`, `_`, `.` and `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DestinationId(String);

impl DestinationId {
    /// Parse and validate an identifier
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::malformed("destination id is empty"));
        }

        if raw.len() > MAX_DESTINATION_ID_LEN {
            return Err(Error::malformed(format!(
                "destination id too long: {} chars (max {})",
                raw.len(),
                MAX_DESTINATION_ID_LEN
            )));
        }

        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')))
        {
            return Err(Error::malformed(format!(
                "destination id '{}' contains invalid character {:?}",
                raw, c
            )));
        }

        Ok(Self(raw.to_string()))
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DestinationId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DestinationId> for String {
    fn from(id: DestinationId) -> Self {
        id.0
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the user owning a destination
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Create an owner id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A located resource owned by a user
///
/// Destinations are immutable here; a change is a delete followed by an
/// insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Unique id
    pub id: DestinationId,
    /// Owning user
    pub owner: OwnerId,
    /// Where the destination is
    pub location: Location,
}

impl Destination {
    /// Create a destination
    pub fn new(id: DestinationId, owner: OwnerId, location: Location) -> Self {
        Self {
            id,
            owner,
            location,
        }
    }

    /// Whether `other` belongs in this destination's matching record
    pub fn matches(&self, other: &Destination) -> bool {
        self.id != other.id && self.owner != other.owner && self.location.overlaps(&other.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_document_style_ids() {
        let id = DestinationId::parse("65a1f0c2e4b0a1b2c3d4e5f6").unwrap();
        assert_eq!(id.as_str(), "65a1f0c2e4b0a1b2c3d4e5f6");
        assert_eq!(id.to_string(), "65a1f0c2e4b0a1b2c3d4e5f6");
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(matches!(DestinationId::parse(""), Err(Error::MalformedInput(_))));
        assert!(DestinationId::parse("has space").is_err());
        assert!(DestinationId::parse("semi;colon").is_err());
        assert!(DestinationId::parse(&"a".repeat(MAX_DESTINATION_ID_LEN + 1)).is_err());
    }

    #[test]
    fn deserialization_validates_ids() {
        let ok: DestinationId = serde_json::from_str("\"d-1\"").unwrap();
        assert_eq!(ok.as_str(), "d-1");
        assert!(serde_json::from_str::<DestinationId>("\"bad id\"").is_err());
    }

    #[test]
    fn same_owner_and_self_never_match() {
        let id = |s: &str| DestinationId::parse(s).unwrap();
        let a = Destination::new(id("a"), OwnerId::new("u1"), Location::country("US"));
        let b = Destination::new(id("b"), OwnerId::new("u1"), Location::country("US"));
        let c = Destination::new(id("c"), OwnerId::new("u2"), Location::country("US"));

        assert!(!a.matches(&a));
        assert!(!a.matches(&b));
        assert!(a.matches(&c));
        assert!(c.matches(&a));
    }
}
