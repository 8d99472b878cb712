//! Subsystem health status: a totally ordered severity enum
//! aggregated by taking the maximum across components.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Status {
    Unknown = 0,
    Operational = 1,
    Caution = 2,
    Failure = 3,
}

impl Status {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Status::Unknown => "Unknown",
            Status::Operational => "Operational",
            Status::Caution => "Caution",
            Status::Failure => "Failure",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Status::Operational,
            2 => Status::Caution,
            3 => Status::Failure,
            _ => Status::Unknown,
        }
    }
}

/// Aggregates component statuses by severity: `UNKNOWN < OPERATIONAL <
/// CAUTION < FAILURE`.
pub fn aggregate(statuses: impl IntoIterator<Item = Status>) -> Status {
    statuses.into_iter().max().unwrap_or(Status::Unknown)
}

/// An atomically-updatable status cell, shared between the component
/// that detects a fault and the controller tick that publishes it.
pub struct StatusCell(AtomicU8);

impl StatusCell {
    pub fn new(initial: Status) -> Self {
        StatusCell(AtomicU8::new(initial as u8))
    }

    pub fn get(&self) -> Status {
        Status::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, status: Status) {
        self.0.store(status as u8, Ordering::Release);
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        StatusCell::new(Status::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_picks_max_severity() {
        assert_eq!(
            aggregate([Status::Operational, Status::Caution, Status::Unknown]),
            Status::Caution
        );
        assert_eq!(aggregate([]), Status::Unknown);
    }
}
