use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Travel class partition of a flight's seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cabin {
    Economy,
    Business,
}

impl Cabin {
    pub const ALL: [Cabin; 2] = [Cabin::Economy, Cabin::Business];

    /// Seat numbers are `E1..En` for economy and `B1..Bn` for business.
    pub fn seat_prefix(&self) -> char {
        match self {
            Cabin::Economy => 'E',
            Cabin::Business => 'B',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cabin::Economy => "economy",
            Cabin::Business => "business",
        }
    }
}

impl fmt::Display for Cabin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCabin(pub String);

impl fmt::Display for UnknownCabin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown cabin: {}", self.0)
    }
}

impl std::error::Error for UnknownCabin {}

impl FromStr for Cabin {
    type Err = UnknownCabin;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "economy" => Ok(Cabin::Economy),
            "business" => Ok(Cabin::Business),
            other => Err(UnknownCabin(other.to_string())),
        }
    }
}
