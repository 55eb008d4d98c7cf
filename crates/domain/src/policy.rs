//! Buffer policies for overflow and failed flushes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What an append does when the pending queue is at capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverflowPolicy {
    /// Discard the oldest pending point.
    #[default]
    DropOldest,
    /// Discard the incoming point.
    DropNewest,
    /// Flush and wait for room; fail if the queue is still full.
    Block,
}

/// What happens to a batch whose bulk write failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    /// Drop the batch.
    #[default]
    Clear,
    /// Put the batch back at the head of the queue.
    Retain,
}

impl OverflowPolicy {
    /// Config spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DropOldest => "dropOldest",
            Self::DropNewest => "dropNewest",
            Self::Block => "block",
        }
    }

    /// Parse the config spelling; kebab and snake case are accepted too.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "dropoldest" => Some(Self::DropOldest),
            "dropnewest" => Some(Self::DropNewest),
            "block" => Some(Self::Block),
            _ => None,
        }
    }
}

impl FailurePolicy {
    /// Config spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Retain => "retain",
        }
    }

    /// Parse the config spelling.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "clear" => Some(Self::Clear),
            "retain" => Some(Self::Retain),
            _ => None,
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_parse_loose_spellings() {
        assert_eq!(OverflowPolicy::parse("drop-newest"), Some(OverflowPolicy::DropNewest));
        assert_eq!(OverflowPolicy::parse("DROP_OLDEST"), Some(OverflowPolicy::DropOldest));
        assert_eq!(OverflowPolicy::parse("spill"), None);
        assert_eq!(FailurePolicy::parse(" Retain "), Some(FailurePolicy::Retain));
    }

    #[test]
    fn policies_serialize_camel_case() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&OverflowPolicy::DropOldest)?, "\"dropOldest\"");
        assert_eq!(serde_json::to_string(&FailurePolicy::Retain)?, "\"retain\"");
        Ok(())
    }
}
