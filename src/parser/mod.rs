pub mod error;
mod raw;

pub use error::ParseError;
pub use raw::{PatternParser, Rule};

use crate::pattern::ObservationExpr;
use crate::version::StixVersion;

/// Parse STIX pattern text under the rules of the given version
pub fn parse_pattern(text: &str, version: StixVersion) -> Result<ObservationExpr, ParseError> {
    PatternParser::parse_pattern(text, version)
}
