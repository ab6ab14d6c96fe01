//! Record identifiers.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::OgmError;

/// Identity of a stored record: `#<cluster>:<position>`.
///
/// Assigned by the driver on first save and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    cluster: u32,
    position: u64,
}

impl Rid {
    pub fn new(cluster: u32, position: u64) -> Self {
        Self { cluster, position }
    }

    pub fn cluster(&self) -> u32 {
        self.cluster
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Parses the `#<cluster>:<position>` form.
    pub fn parse(text: &str) -> Result<Self, OgmError> {
        let body = text
            .strip_prefix('#')
            .ok_or_else(|| OgmError::identity(text, "expected leading '#'"))?;
        let (cluster, position) = body
            .split_once(':')
            .ok_or_else(|| OgmError::identity(text, "expected '<cluster>:<position>'"))?;

        let cluster = cluster
            .parse::<u32>()
            .map_err(|e| OgmError::identity(text, format!("bad cluster id: {}", e)))?;
        let position = position
            .parse::<u64>()
            .map_err(|e| OgmError::identity(text, format!("bad cluster position: {}", e)))?;

        let rid = Self { cluster, position };
        // Only the canonical form is accepted, so text and rid convert 1:1
        if rid.to_string() != text {
            return Err(OgmError::identity(text, "not in canonical form"));
        }
        Ok(rid)
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.cluster, self.position)
    }
}

impl FromStr for Rid {
    type Err = OgmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Rid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RidVisitor;

        impl Visitor<'_> for RidVisitor {
            type Value = Rid;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a record id such as #12:0")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Rid, E> {
                Rid::parse(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(RidVisitor)
    }
}
