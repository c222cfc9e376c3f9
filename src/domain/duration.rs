//! Parsing of compact duration strings such as `15s`, `100ms` or `1h30m`.

use std::fmt;
use std::time::Duration;

/// Error returned for a malformed duration string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDurationError(String);

impl fmt::Display for ParseDurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid duration {:?}", self.0)
    }
}

impl std::error::Error for ParseDurationError {}

/// Parse a sequence of `<number><unit>` groups such as `15s` or `1h30m`.
///
/// Units: `ns`, `us`, `ms`, `s`, `m`, `h`, `d`. Every group needs a unit;
/// only a bare `0` may omit it.
pub fn parse_duration(input: &str) -> Result<Duration, ParseDurationError> {
    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    // duration_str reads a unitless number as seconds; directives must not.
    if !s.ends_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(ParseDurationError(input.to_string()));
    }
    duration_str::parse(s).map_err(|_| ParseDurationError(input.to_string()))
}
