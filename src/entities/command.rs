use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A lifecycle event issued against a single booking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Command {
    ProposeFare { driver_id: Uuid, fare: f64 },
    Approve,
    Reject,
    Start,
    Complete,
    Cancel,
}

impl Command {
    /// Action name checked against the authorization policy.
    pub fn action(&self) -> &'static str {
        match self {
            Self::ProposeFare { .. } => "propose_fare",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }
}

/// What a successful transition requires of the driver registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Nothing to write.
    Unchanged,
    /// Booking write only.
    Status,
    /// Booking write, conditioned on the driver still being available.
    Guard(Uuid),
    /// Booking write plus marking the driver unavailable.
    Engage(Uuid),
    /// Booking write plus marking the driver available again.
    Release(Uuid),
}
