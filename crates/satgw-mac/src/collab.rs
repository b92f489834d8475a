//! Collaborator interfaces of the gateway MAC.
//!
//! The MAC pulls backlog snapshots from a [`SchedContextProvider`], negotiates
//! exact-size units from a [`TxOpportunity`], hands finished frames to a
//! [`FrameSink`] and delivers inbound payloads to an [`RxHandler`]. All four
//! are implemented by the LLC / PHY layers in a full stack and by
//! deterministic doubles in tests.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;

use crate::address::MacAddress;
use crate::error::MacError;
use crate::frame::TxUnit;

// ─── Scheduling objects ─────────────────────────────────────────────────────

/// Backlog of one endpoint for a single scheduling round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingObject {
    pub address: MacAddress,
    pub buffered_bytes: u32,
    pub is_control: bool,
}

impl SchedulingObject {
    pub fn data(address: MacAddress, buffered_bytes: u32) -> Self {
        Self {
            address,
            buffered_bytes,
            is_control: false,
        }
    }

    pub fn control(address: MacAddress, buffered_bytes: u32) -> Self {
        Self {
            address,
            buffered_bytes,
            is_control: true,
        }
    }
}

/// Order in which the provider should return scheduling objects.
///
/// The MAC only forwards the criterion; comparators live with the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortCriterion {
    /// Provider order is kept.
    #[default]
    NoSort,
    BufferingDelaySort,
    BufferingLoadSort,
    RandomSort,
    PrioritySort,
}

impl SortCriterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortCriterion::NoSort => "no_sort",
            SortCriterion::BufferingDelaySort => "buffering_delay",
            SortCriterion::BufferingLoadSort => "buffering_load",
            SortCriterion::RandomSort => "random",
            SortCriterion::PrioritySort => "priority",
        }
    }
}

impl fmt::Display for SortCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortCriterion {
    type Err = MacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no_sort" | "none" => Ok(SortCriterion::NoSort),
            "buffering_delay" | "buffering_delay_sort" | "delay" => {
                Ok(SortCriterion::BufferingDelaySort)
            }
            "buffering_load" | "buffering_load_sort" | "load" => {
                Ok(SortCriterion::BufferingLoadSort)
            }
            "random" | "random_sort" => Ok(SortCriterion::RandomSort),
            "priority" | "priority_sort" => Ok(SortCriterion::PrioritySort),
            _ => Err(MacError::InvalidSortCriterion(s.to_string())),
        }
    }
}

// ─── Negotiation ────────────────────────────────────────────────────────────

/// Answer of the data source to one transmission opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxOpportunityResult {
    /// The unit built for the opportunity. `None` is a valid answer.
    pub unit: Option<TxUnit>,
    /// Bytes the destination still has buffered after the attempt.
    pub bytes_left: u32,
}

impl TxOpportunityResult {
    pub fn none(bytes_left: u32) -> Self {
        Self {
            unit: None,
            bytes_left,
        }
    }
}

// ─── Collaborators ──────────────────────────────────────────────────────────

/// Buffer-status provider: returns this round's scheduling objects.
pub trait SchedContextProvider {
    fn scheduling_objects(&mut self, criterion: SortCriterion) -> Vec<SchedulingObject>;
}

/// Data-source negotiator: builds a unit of at most `max_bytes` for `destination`.
pub trait TxOpportunity {
    fn tx_opportunity(&mut self, max_bytes: u32, destination: MacAddress) -> TxOpportunityResult;
}

/// Transmission sink for finished frames.
pub trait FrameSink {
    fn send_frame(&mut self, units: Vec<TxUnit>, carrier_id: u32, duration: Duration);
}

/// Upper-layer receive hook for inbound payloads.
pub trait RxHandler {
    fn receive(&mut self, payload: Bytes, source: MacAddress);
}

impl<F> SchedContextProvider for F
where
    F: FnMut(SortCriterion) -> Vec<SchedulingObject>,
{
    fn scheduling_objects(&mut self, criterion: SortCriterion) -> Vec<SchedulingObject> {
        self(criterion)
    }
}

impl<F> TxOpportunity for F
where
    F: FnMut(u32, MacAddress) -> TxOpportunityResult,
{
    fn tx_opportunity(&mut self, max_bytes: u32, destination: MacAddress) -> TxOpportunityResult {
        self(max_bytes, destination)
    }
}

impl<F> FrameSink for F
where
    F: FnMut(Vec<TxUnit>, u32, Duration),
{
    fn send_frame(&mut self, units: Vec<TxUnit>, carrier_id: u32, duration: Duration) {
        self(units, carrier_id, duration)
    }
}

impl<F> RxHandler for F
where
    F: FnMut(Bytes, MacAddress),
{
    fn receive(&mut self, payload: Bytes, source: MacAddress) {
        self(payload, source)
    }
}
