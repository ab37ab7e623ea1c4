//! Dynamic port allow-list.
//!
//! # Responsibilities
//! - Parse a captured path segment as a base-10 TCP port
//! - Reject anything outside the configured closed range
//!
//! # Design Decisions
//! - Digits only: signs, whitespace and hex prefixes are rejected
//! - Overlong digit strings are out of range, not parse failures
//! - The range is closed on both ends

use std::fmt;

/// A closed range of ports that dynamic-port routes may forward to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    min: u16,
    max: u16,
}

/// Why a captured port segment was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("port segment {0:?} is not a base-10 integer")]
    NotNumeric(String),

    #[error("port {port} is outside the allowed range {range}")]
    OutOfRange { port: String, range: PortRange },
}

impl PortRange {
    /// Band used by sibling worker processes.
    pub const WORKERS: PortRange = PortRange { min: 8000, max: 9000 };

    pub fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> u16 {
        self.min
    }

    pub fn max(&self) -> u16 {
        self.max
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.min..=self.max).contains(&port)
    }

    /// Validate a raw path segment and return the port it names.
    pub fn parse(&self, segment: &str) -> Result<u16, PortError> {
        if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PortError::NotNumeric(segment.to_string()));
        }

        let out_of_range = || PortError::OutOfRange {
            port: segment.to_string(),
            range: *self,
        };

        // All digits, so the only possible parse failure is overflow.
        let value: u16 = segment.parse().map_err(|_| out_of_range())?;
        if self.contains(value) {
            Ok(value)
        } else {
            Err(out_of_range())
        }
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::WORKERS
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}
