//! The campaign lifecycle state machine.
//!
//! `Draft → Scheduled → Active ⇄ Paused`, with `Cancelled` reachable from any non-terminal state
//! and `Expired` set lazily by evaluation reads once the end date has passed. The transition table
//! is pure; the store enforces it with a guarded conditional update so that concurrent
//! administrative calls cannot race past it.

use thiserror::Error;

use crate::db_types::CampaignStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    Schedule,
    Activate,
    Pause,
    Cancel,
}

impl std::fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleOp::Schedule => write!(f, "Schedule"),
            LifecycleOp::Activate => write!(f, "Activate"),
            LifecycleOp::Pause => write!(f, "Pause"),
            LifecycleOp::Cancel => write!(f, "Cancel"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cannot {op} a campaign in {from} status")]
pub struct InvalidTransition {
    pub from: CampaignStatus,
    pub op: LifecycleOp,
}

impl LifecycleOp {
    /// The status a successful transition lands in.
    pub fn target(&self) -> CampaignStatus {
        match self {
            LifecycleOp::Schedule => CampaignStatus::Scheduled,
            LifecycleOp::Activate => CampaignStatus::Active,
            LifecycleOp::Pause => CampaignStatus::Paused,
            LifecycleOp::Cancel => CampaignStatus::Cancelled,
        }
    }

    /// The statuses the transition is allowed to start from.
    pub fn allowed_from(&self) -> &'static [CampaignStatus] {
        use CampaignStatus::*;
        match self {
            LifecycleOp::Schedule => &[Draft],
            LifecycleOp::Activate => &[Scheduled, Paused],
            LifecycleOp::Pause => &[Scheduled, Active],
            LifecycleOp::Cancel => &[Draft, Scheduled, Active, Paused],
        }
    }
}

/// Applies `op` to `current`, returning the new status or `InvalidTransition`.
pub fn apply(op: LifecycleOp, current: CampaignStatus) -> Result<CampaignStatus, InvalidTransition> {
    if op.allowed_from().contains(&current) {
        Ok(op.target())
    } else {
        Err(InvalidTransition { from: current, op })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::CampaignStatus::*;

    #[test]
    fn schedule_only_from_draft() {
        assert_eq!(apply(LifecycleOp::Schedule, Draft), Ok(Scheduled));
        for from in [Scheduled, Active, Paused, Cancelled, Expired] {
            assert!(apply(LifecycleOp::Schedule, from).is_err());
        }
    }

    #[test]
    fn activate_from_scheduled_or_paused() {
        assert_eq!(apply(LifecycleOp::Activate, Scheduled), Ok(Active));
        assert_eq!(apply(LifecycleOp::Activate, Paused), Ok(Active));
        let err = apply(LifecycleOp::Activate, Draft).unwrap_err();
        assert_eq!(err, InvalidTransition { from: Draft, op: LifecycleOp::Activate });
        assert!(apply(LifecycleOp::Activate, Cancelled).is_err());
        assert!(apply(LifecycleOp::Activate, Expired).is_err());
    }

    #[test]
    fn pause_from_scheduled_or_active() {
        assert_eq!(apply(LifecycleOp::Pause, Scheduled), Ok(Paused));
        assert_eq!(apply(LifecycleOp::Pause, Active), Ok(Paused));
        assert!(apply(LifecycleOp::Pause, Draft).is_err());
        assert!(apply(LifecycleOp::Pause, Paused).is_err());
    }

    #[test]
    fn cancel_from_any_non_terminal_state() {
        for from in [Draft, Scheduled, Active, Paused] {
            assert_eq!(apply(LifecycleOp::Cancel, from), Ok(Cancelled));
        }
        assert!(apply(LifecycleOp::Cancel, Cancelled).is_err());
        assert!(apply(LifecycleOp::Cancel, Expired).is_err());
    }

    #[test]
    fn terminal_states_admit_nothing() {
        for op in [LifecycleOp::Schedule, LifecycleOp::Activate, LifecycleOp::Pause, LifecycleOp::Cancel] {
            assert!(apply(op, Cancelled).is_err());
            assert!(apply(op, Expired).is_err());
        }
    }
}
