//! Frame sink and receive hook used by the simulator.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

use satgw_mac::collab::{FrameSink, RxHandler};
use satgw_mac::frame::TxUnit;
use satgw_mac::MacAddress;

/// Aggregates of everything put on the forward carrier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SinkStats {
    pub frames: u64,
    pub dummy_frames: u64,
    pub units: u64,
    pub payload_bytes: u64,
    /// Sum of frame durations, dummy frames included.
    pub airtime_us: u64,
}

/// Records per-terminal deliveries instead of modulating anything.
///
/// A frame whose units are all addressed from the gateway to itself is
/// counted as a dummy frame and delivers nothing.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    gateway: MacAddress,
    stats: SinkStats,
    delivered: BTreeMap<MacAddress, u64>,
    carriers: BTreeMap<u32, u64>,
}

impl RecordingSink {
    pub fn new(gateway: MacAddress) -> Self {
        Self {
            gateway,
            stats: SinkStats::default(),
            delivered: BTreeMap::new(),
            carriers: BTreeMap::new(),
        }
    }

    pub fn stats(&self) -> &SinkStats {
        &self.stats
    }

    pub fn delivered_to(&self, terminal: MacAddress) -> u64 {
        self.delivered.get(&terminal).copied().unwrap_or(0)
    }

    /// Frames sent per carrier id.
    pub fn carriers(&self) -> &BTreeMap<u32, u64> {
        &self.carriers
    }

    fn is_dummy(&self, units: &[TxUnit]) -> bool {
        !units.is_empty()
            && units.iter().all(|u| {
                u.tag
                    .is_some_and(|t| t.source == self.gateway && t.destination == self.gateway)
            })
    }
}

impl FrameSink for RecordingSink {
    fn send_frame(&mut self, units: Vec<TxUnit>, carrier_id: u32, duration: Duration) {
        *self.carriers.entry(carrier_id).or_default() += 1;
        self.stats.airtime_us += duration.as_micros() as u64;
        if self.is_dummy(&units) {
            self.stats.dummy_frames += 1;
            return;
        }
        self.stats.frames += 1;
        for unit in units {
            let size = u64::from(unit.size());
            self.stats.units += 1;
            self.stats.payload_bytes += size;
            if let Some(tag) = unit.tag {
                *self.delivered.entry(tag.destination).or_default() += size;
            }
        }
    }
}

/// Counts return-link payloads handed up by the MAC, per source.
#[derive(Debug, Clone, Default)]
pub struct InboundLog {
    received: BTreeMap<MacAddress, u64>,
}

impl InboundLog {
    pub fn received_from(&self, source: MacAddress) -> u64 {
        self.received.get(&source).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.received.values().sum()
    }
}

impl RxHandler for InboundLog {
    fn receive(&mut self, payload: Bytes, source: MacAddress) {
        *self.received.entry(source).or_default() += payload.len() as u64;
    }
}
