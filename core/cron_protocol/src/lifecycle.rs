//! # Job lifecycle
//!
//! ```text
//! Uninitialized ──► Active ◄──► Dormant
//!       │             │            │
//!       └─────────────┴────────────┴──► Destroyed
//! ```
//!
//! Transitions happen on-chain (first execution, balance changes, destroy
//! messages). This module only classifies an observed snapshot.

use serde::{Deserialize, Serialize};

/// What was observed about a job account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobObservation {
    pub initialized: bool,
    pub balance: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Deployed, never executed.
    Uninitialized,
    /// Executed at least once and funded for another cycle.
    Active,
    /// Executed at least once but short of one cycle's cost.
    Dormant,
    /// Account storage no longer exists.
    Destroyed,
}

impl JobStatus {
    /// Classify a snapshot; `None` means the account no longer exists.
    pub fn classify(observation: Option<&JobObservation>, cost_per_cycle: u128) -> Self {
        match observation {
            None => Self::Destroyed,
            Some(o) if !o.initialized => Self::Uninitialized,
            Some(o) if o.balance >= cost_per_cycle => Self::Active,
            Some(_) => Self::Dormant,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Active => "active",
            Self::Dormant => "dormant",
            Self::Destroyed => "destroyed",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "uninitialized" => Some(Self::Uninitialized),
            "active" => Some(Self::Active),
            "dormant" => Some(Self::Dormant),
            "destroyed" => Some(Self::Destroyed),
            _ => None,
        }
    }

    /// Whether moving from `self` to `to` is possible on-chain.
    ///
    /// Staying in a state is always allowed; nothing leaves `Destroyed`.
    pub fn can_transition(&self, to: &JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Uninitialized, Uninitialized)
                | (Uninitialized, Active)
                | (Uninitialized, Dormant)
                | (Uninitialized, Destroyed)
                | (Active, Active)
                | (Active, Dormant)
                | (Active, Destroyed)
                | (Dormant, Dormant)
                | (Dormant, Active)
                | (Dormant, Destroyed)
                | (Destroyed, Destroyed)
        )
    }
}
