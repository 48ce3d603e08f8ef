// src/votes.rs
//! Per-state vote tallies for the two parties shown on the map.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Party {
    PartyA,
    PartyB,
}

impl Party {
    pub fn as_str(&self) -> &'static str {
        match self {
            Party::PartyA => "PartyA",
            Party::PartyB => "PartyB",
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownParty(pub String);

impl fmt::Display for UnknownParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown party '{}'. Use 'PartyA' or 'PartyB'.", self.0)
    }
}

impl FromStr for Party {
    type Err = UnknownParty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PartyA" => Ok(Party::PartyA),
            "PartyB" => Ok(Party::PartyB),
            other => Err(UnknownParty(other.to_string())),
        }
    }
}

/// Vote counts for one state. Serialized with the field names the frontend reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub state: String,
    #[serde(rename = "PartyA")]
    pub party_a: u64,
    #[serde(rename = "PartyB")]
    pub party_b: u64,
}

impl VoteTally {
    /// What a state with no votes yet reports.
    pub fn empty(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            party_a: 0,
            party_b: 0,
        }
    }

    pub fn record(&mut self, party: Party) {
        match party {
            Party::PartyA => self.party_a += 1,
            Party::PartyB => self.party_b += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn party_parses_exact_names_only() {
        assert_eq!("PartyA".parse::<Party>(), Ok(Party::PartyA));
        assert_eq!(" PartyB ".parse::<Party>(), Ok(Party::PartyB));
        assert!("partya".parse::<Party>().is_err());
        assert!("__proto__".parse::<Party>().is_err());
    }

    #[test]
    fn tally_serializes_with_frontend_names() {
        let mut t = VoteTally::empty("OH");
        t.record(Party::PartyB);
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v, serde_json::json!({"state": "OH", "PartyA": 0, "PartyB": 1}));
    }
}
