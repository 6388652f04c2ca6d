use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::EquivalenceError;

/// STIX specification version a pattern is parsed against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StixVersion {
    V2_0,
    #[default]
    V2_1,
}

/// Version used when the caller doesn't pick one
pub const DEFAULT_VERSION: StixVersion = StixVersion::V2_1;

impl StixVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            StixVersion::V2_0 => "2.0",
            StixVersion::V2_1 => "2.1",
        }
    }
}

impl Display for StixVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StixVersion {
    type Err = EquivalenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2.0" => Ok(StixVersion::V2_0),
            "2.1" => Ok(StixVersion::V2_1),
            other => Err(EquivalenceError::UnsupportedVersion {
                version: other.to_string(),
            }),
        }
    }
}
