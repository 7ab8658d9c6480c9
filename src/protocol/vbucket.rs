//! Vbucket states
//!
//! States travel as lowercase text in the value of the vbucket commands.

use std::str::FromStr;

/// State tag of a vbucket partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VbucketState {
    Active,
    Replica,
    Pending,
    Dead,
}

impl VbucketState {
    pub fn name(self) -> &'static str {
        match self {
            VbucketState::Active => "active",
            VbucketState::Replica => "replica",
            VbucketState::Pending => "pending",
            VbucketState::Dead => "dead",
        }
    }
}

impl FromStr for VbucketState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(VbucketState::Active),
            "replica" => Ok(VbucketState::Replica),
            "pending" => Ok(VbucketState::Pending),
            "dead" => Ok(VbucketState::Dead),
            other => Err(format!("unknown vbucket state {:?}", other)),
        }
    }
}

impl std::fmt::Display for VbucketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
