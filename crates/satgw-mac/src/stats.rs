//! # MAC Statistics
//!
//! Counters kept by the gateway MAC, serializable for scenario reports.

use serde::Serialize;

use crate::scheduler::PackingReport;

/// Aggregate gateway MAC statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MacStats {
    /// Timer ticks handled.
    pub ticks: u64,
    /// Frames taken from the frame queue and sent.
    pub frames_sent: u64,
    /// Filler frames sent on idle ticks.
    pub dummy_frames_sent: u64,
    /// Ticks on which nothing was sent.
    pub idle_ticks: u64,
    /// Payload bytes sent in queued frames (dummy frames excluded).
    pub payload_bytes_sent: u64,
    /// Frames produced by packing passes.
    pub frames_built: u64,
    /// Backlog offered by scheduling objects across all passes.
    pub demand_bytes: u64,
    /// Backlog left behind because negotiation came up short.
    pub unclaimed_bytes: u64,
    /// Inbound units passed to the upper layer.
    pub rx_delivered: u64,
    /// Inbound units addressed to someone else.
    pub rx_discarded: u64,
}

impl MacStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_packing(&mut self, report: &PackingReport) {
        self.frames_built += report.frames_built;
        self.demand_bytes += report.initial_demand;
        self.unclaimed_bytes += report.unclaimed_bytes;
    }

    /// Share of ticks that carried a real frame.
    pub fn utilisation(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.frames_sent as f64 / self.ticks as f64
        }
    }
}
