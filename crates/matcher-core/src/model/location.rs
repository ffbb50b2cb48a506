// # Location Hierarchy
//
// Country / region / city with explicit wildcards.
//
// A region or city is either `Any` ("anywhere within the parent") or an
// exact value. Producers that still use the empty-string sentinel convert
// at the boundary via `LocationField::from("")`.
//
// ## Overlap Rule
//
// Two locations overlap when their countries are equal and one of:
// 1. either side is country-wide (region and city both `Any`)
// 2. regions are equal and at least one city is `Any`
// 3. regions are equal and cities are equal
//
// The rule is symmetric.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A region or city value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationField {
    /// Matches anything at this level
    #[default]
    Any,
    /// A concrete value
    Exact(String),
}

impl LocationField {
    /// Create an exact field
    pub fn exact(value: impl Into<String>) -> Self {
        Self::Exact(value.into())
    }

    /// Whether this field is the wildcard
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

/// Empty string is the legacy wildcard sentinel
impl From<&str> for LocationField {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Self::Any
        } else {
            Self::Exact(value.to_string())
        }
    }
}

impl From<String> for LocationField {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Self::Any
        } else {
            Self::Exact(value)
        }
    }
}

impl From<Option<String>> for LocationField {
    fn from(value: Option<String>) -> Self {
        value.map(Self::from).unwrap_or(Self::Any)
    }
}

impl fmt::Display for LocationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Exact(value) => f.write_str(value),
        }
    }
}

/// A country / region / city triple
///
/// Deserialization rejects a blank country.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawLocation")]
pub struct Location {
    /// Country (always exact)
    pub country: String,
    /// Region within the country
    #[serde(default)]
    pub region: LocationField,
    /// City within the region
    #[serde(default)]
    pub city: LocationField,
}

impl Location {
    /// Create a location
    ///
    /// `region` and `city` accept anything convertible into a
    /// [`LocationField`], including the legacy `""` wildcard.
    pub fn new(
        country: impl Into<String>,
        region: impl Into<LocationField>,
        city: impl Into<LocationField>,
    ) -> Self {
        Self {
            country: country.into(),
            region: region.into(),
            city: city.into(),
        }
    }

    /// Create a location from untrusted input
    pub fn try_new(
        country: impl Into<String>,
        region: impl Into<LocationField>,
        city: impl Into<LocationField>,
    ) -> Result<Self> {
        let country = country.into();
        if country.trim().is_empty() {
            return Err(Error::malformed("location country is empty"));
        }
        Ok(Self::new(country, region, city))
    }

    /// A location covering the whole country
    pub fn country(country: impl Into<String>) -> Self {
        Self::new(country, LocationField::Any, LocationField::Any)
    }

    /// Region and city are both wildcards
    pub fn is_country_wide(&self) -> bool {
        self.region.is_any() && self.city.is_any()
    }

    /// Location hierarchy predicate
    pub fn overlaps(&self, other: &Location) -> bool {
        if self.country != other.country {
            return false;
        }

        if self.is_country_wide() || other.is_country_wide() {
            return true;
        }

        self.region == other.region
            && (self.city.is_any() || other.city.is_any() || self.city == other.city)
    }
}

#[derive(Deserialize)]
struct RawLocation {
    country: String,
    #[serde(default)]
    region: LocationField,
    #[serde(default)]
    city: LocationField,
}

impl TryFrom<RawLocation> for Location {
    type Error = Error;

    fn try_from(raw: RawLocation) -> Result<Self> {
        Self::try_new(raw.country, raw.region, raw.city)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.country, self.region, self.city)
    }
}
