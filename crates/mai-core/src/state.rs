use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MaiError;

/// Engagement level of a thinking flow.
///
/// States are compared by rank through [`FlowState::is_at_least`] and have
/// no `Ord` implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowState {
    /// Nothing is happening; the scheduler is parked without a timer.
    #[default]
    Dormant = 0,
    /// The conversation is active; ticks run at the engaged interval.
    Engaged = 1,
    /// Something worth attention is going on; ticks run at the focused interval.
    Focused = 2,
}

impl FlowState {
    pub const ALL: [FlowState; 3] = [FlowState::Dormant, FlowState::Engaged, FlowState::Focused];

    pub const fn rank(self) -> u8 {
        self as u8
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.rank() == rank)
    }

    pub const fn is_at_least(self, other: FlowState) -> bool {
        self.rank() >= other.rank()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            FlowState::Dormant => "dormant",
            FlowState::Engaged => "engaged",
            FlowState::Focused => "focused",
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowState {
    type Err = MaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dormant" => Ok(FlowState::Dormant),
            "engaged" => Ok(FlowState::Engaged),
            "focused" => Ok(FlowState::Focused),
            other => Err(MaiError::Persistence(format!("unknown flow state '{other}'"))),
        }
    }
}
