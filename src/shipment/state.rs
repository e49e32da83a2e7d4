use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Lifecycle status of a shipment.
///
/// Every shipment flows: ACCEPTED → IN_PROGRESS → {FINISHED | DENIED | FAILED}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Accepted,
    InProgress,
    Finished,
    Denied,
    Failed,
}

impl ShipmentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ShipmentStatus::Finished | ShipmentStatus::Denied | ShipmentStatus::Failed
        )
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShipmentStatus::Accepted => write!(f, "accepted"),
            ShipmentStatus::InProgress => write!(f, "in_progress"),
            ShipmentStatus::Finished => write!(f, "finished"),
            ShipmentStatus::Denied => write!(f, "denied"),
            ShipmentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Things that happen to a shipment while the coordinator drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// The uploaded input is durably stored.
    InputStored,
    /// The computation succeeded and its results are persisted.
    ResultsPersisted,
    /// The submission was rejected for a caller-fixable reason.
    Rejected,
    /// Storage, subprocess or persistence failed.
    Errored,
}

/// Validates shipment status transitions.
pub struct StatusMachine;

impl StatusMachine {
    /// Compute the status a shipment moves to when `event` happens in `from`.
    ///
    /// - `Accepted` advances to `InProgress` once the input is stored, and may
    ///   end in `Denied` (rejected at intake) or `Failed`.
    /// - `InProgress` ends in `Finished`, `Denied` or `Failed`.
    /// - Terminal statuses accept no event.
    pub fn next(from: ShipmentStatus, event: StatusEvent) -> Result<ShipmentStatus, PipelineError> {
        use ShipmentStatus::*;
        use StatusEvent::*;

        let to = match (from, event) {
            (Accepted, InputStored) => InProgress,
            (Accepted, Rejected) | (InProgress, Rejected) => Denied,
            (Accepted, Errored) | (InProgress, Errored) => Failed,
            (InProgress, ResultsPersisted) => Finished,
            _ => return Err(PipelineError::IllegalTransition { from, event }),
        };
        Ok(to)
    }
}
