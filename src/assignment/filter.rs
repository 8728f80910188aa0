use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which shapes a vessel slot accepts.
///
/// Serialised with the collector table names: `"None"`, `"All"`,
/// `"Remaining"`, or the class name itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SlotFilter {
    NoAssignment,
    AllObjects,
    Class(String),
    RemainingObjects,
}

impl SlotFilter {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoAssignment => "None",
            Self::AllObjects => "All",
            Self::Class(name) => name,
            Self::RemainingObjects => "Remaining",
        }
    }
}

impl From<String> for SlotFilter {
    fn from(value: String) -> Self {
        match value.as_str() {
            "None" => Self::NoAssignment,
            "All" => Self::AllObjects,
            "Remaining" => Self::RemainingObjects,
            _ => Self::Class(value),
        }
    }
}

impl From<SlotFilter> for String {
    fn from(filter: SlotFilter) -> Self {
        match filter {
            SlotFilter::Class(name) => name,
            other => other.as_str().to_owned(),
        }
    }
}

impl FromStr for SlotFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_owned()))
    }
}

impl fmt::Display for SlotFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
