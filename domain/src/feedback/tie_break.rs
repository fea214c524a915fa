//! Tie-break policy for conflict resolution
//!
//! Decides what happens when the weighted votes for two or more actions are
//! exactly equal and no veto applies.

use serde::{Deserialize, Serialize};

/// Rule applied to an exact weighted tie
///
/// - `Conservative`: the more conservative action wins (reject over revise
///   over accept). This is the default.
/// - `Manual`: the conflict is reported as unresolvable and handed to a
///   manual decision.
///
/// # Example
///
/// ```
/// use phasegate_domain::feedback::TieBreak;
///
/// assert_eq!("manual".parse::<TieBreak>().ok(), Some(TieBreak::Manual));
/// assert_eq!(TieBreak::default(), TieBreak::Conservative);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    #[default]
    Conservative,
    Manual,
}

impl TieBreak {
    pub fn description(&self) -> &'static str {
        match self {
            TieBreak::Conservative => "conservative (reject over accept)",
            TieBreak::Manual => "manual (ties need a human decision)",
        }
    }
}

impl std::fmt::Display for TieBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::str::FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conservative" => Ok(TieBreak::Conservative),
            "manual" | "none" => Ok(TieBreak::Manual),
            _ => Err(format!(
                "Unknown tie break: {}. Valid: conservative, manual",
                s
            )),
        }
    }
}
