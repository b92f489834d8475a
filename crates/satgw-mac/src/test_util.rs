//! Deterministic collaborator doubles for exercising the MAC without an LLC
//! or PHY.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use bytes::Bytes;

use crate::address::MacAddress;
use crate::collab::{FrameSink, RxHandler, TxOpportunity, TxOpportunityResult};
use crate::frame::TxUnit;

/// Data source holding a plain byte backlog per destination.
///
/// Every opportunity is answered with one unit of `min(max_bytes, backlog)`
/// bytes. Destinations listed in `refuse` never produce a unit.
#[derive(Debug, Clone)]
pub struct BacklogSource {
    pub source: MacAddress,
    pub backlog: HashMap<MacAddress, u32>,
    pub refuse: HashSet<MacAddress>,
    /// Every `(max_bytes, destination)` request in arrival order.
    pub requests: Vec<(u32, MacAddress)>,
}

impl BacklogSource {
    pub fn new(source: MacAddress) -> Self {
        Self {
            source,
            backlog: HashMap::new(),
            refuse: HashSet::new(),
            requests: Vec::new(),
        }
    }

    pub fn with_backlog(mut self, destination: MacAddress, bytes: u32) -> Self {
        *self.backlog.entry(destination).or_default() += bytes;
        self
    }

    pub fn refusing(mut self, destination: MacAddress) -> Self {
        self.refuse.insert(destination);
        self
    }

    pub fn remaining(&self, destination: MacAddress) -> u32 {
        self.backlog.get(&destination).copied().unwrap_or(0)
    }
}

impl TxOpportunity for BacklogSource {
    fn tx_opportunity(&mut self, max_bytes: u32, destination: MacAddress) -> TxOpportunityResult {
        self.requests.push((max_bytes, destination));
        let left = self.backlog.entry(destination).or_default();
        if *left == 0 || self.refuse.contains(&destination) {
            return TxOpportunityResult::none(*left);
        }
        let take = max_bytes.min(*left);
        *left -= take;
        TxOpportunityResult {
            unit: Some(TxUnit::new(
                Bytes::from(vec![0u8; take as usize]),
                self.source,
                destination,
            )),
            bytes_left: *left,
        }
    }
}

/// A frame as seen by the transmission sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub units: Vec<TxUnit>,
    pub carrier_id: u32,
    pub duration: Duration,
}

impl SentFrame {
    pub fn payload_bytes(&self) -> u32 {
        self.units.iter().map(TxUnit::size).sum()
    }
}

/// Sink that keeps every frame it is handed.
#[derive(Debug, Clone, Default)]
pub struct FrameRecorder {
    pub frames: Vec<SentFrame>,
}

impl FrameSink for FrameRecorder {
    fn send_frame(&mut self, units: Vec<TxUnit>, carrier_id: u32, duration: Duration) {
        self.frames.push(SentFrame {
            units,
            carrier_id,
            duration,
        });
    }
}

/// Receive hook that keeps every delivered payload.
#[derive(Debug, Clone, Default)]
pub struct RxRecorder {
    pub delivered: Vec<(Bytes, MacAddress)>,
}

impl RxHandler for RxRecorder {
    fn receive(&mut self, payload: Bytes, source: MacAddress) {
        self.delivered.push((payload, source));
    }
}
