//! # BBFrame container
//!
//! A [`BbFrame`] aggregates units addressed to any number of terminals into a
//! single forward-link transmission opportunity. Capacity is fixed when the
//! frame is created and is only ever consumed:
//!
//! ```text
//!   capacity ──add(unit)──▶ bytes_left ──add(unit)──▶ … ──▶ 0 (full)
//! ```
//!
//! The sum of packed unit sizes never exceeds the capacity. Control units may
//! be charged a different fixed overhead than data units.

use std::time::Duration;

use bytes::Bytes;

use crate::address::MacAddress;
use crate::error::FrameError;

/// Short BBFrame: 16200 bits.
pub const SHORT_FRAME_BYTES: u32 = 2025;
/// Normal BBFrame: 64800 bits.
pub const NORMAL_FRAME_BYTES: u32 = 8100;

// ─── Frame Type ─────────────────────────────────────────────────────────────

/// Length class of a BBFrame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Short,
    Normal,
}

impl FrameType {
    pub fn capacity_bytes(&self) -> u32 {
        match self {
            FrameType::Short => SHORT_FRAME_BYTES,
            FrameType::Normal => NORMAL_FRAME_BYTES,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameType::Short => "short",
            FrameType::Normal => "normal",
        }
    }
}

// ─── Units ──────────────────────────────────────────────────────────────────

/// Addressing metadata the lower layers attach to every unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacTag {
    pub source: MacAddress,
    pub destination: MacAddress,
}

/// One packed data unit (an LLC PDU) carried inside a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxUnit {
    pub payload: Bytes,
    pub tag: Option<MacTag>,
}

impl TxUnit {
    pub fn new(payload: Bytes, source: MacAddress, destination: MacAddress) -> Self {
        TxUnit {
            payload,
            tag: Some(MacTag {
                source,
                destination,
            }),
        }
    }

    /// A unit without a MAC tag. Receiving one is fatal.
    pub fn untagged(payload: Bytes) -> Self {
        TxUnit { payload, tag: None }
    }

    pub fn size(&self) -> u32 {
        self.payload.len() as u32
    }
}

// ─── Frame Parameters ───────────────────────────────────────────────────────

/// Transmission parameters shared by all frames of one gateway MAC.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameParams {
    /// Extra bytes charged per data unit.
    pub data_overhead_bytes: u32,
    /// Extra bytes charged per control unit.
    pub control_overhead_bytes: u32,
    pub short_frame_duration: Duration,
    pub normal_frame_duration: Duration,
}

impl Default for FrameParams {
    fn default() -> Self {
        Self {
            data_overhead_bytes: 0,
            control_overhead_bytes: 10,
            short_frame_duration: Duration::from_micros(250),
            normal_frame_duration: Duration::from_micros(1000),
        }
    }
}

impl FrameParams {
    pub fn duration_for(&self, frame_type: FrameType) -> Duration {
        match frame_type {
            FrameType::Short => self.short_frame_duration,
            FrameType::Normal => self.normal_frame_duration,
        }
    }
}

// ─── BbFrame ────────────────────────────────────────────────────────────────

/// A capacity-bounded container of packed units.
#[derive(Debug, Clone)]
pub struct BbFrame {
    frame_type: FrameType,
    modcod: u32,
    capacity: u32,
    bytes_left: u32,
    duration: Duration,
    data_overhead: u32,
    control_overhead: u32,
    units: Vec<TxUnit>,
}

impl BbFrame {
    pub fn new(modcod: u32, frame_type: FrameType, params: &FrameParams) -> Self {
        let capacity = frame_type.capacity_bytes();
        BbFrame {
            frame_type,
            modcod,
            capacity,
            bytes_left: capacity,
            duration: params.duration_for(frame_type),
            data_overhead: params.data_overhead_bytes,
            control_overhead: params.control_overhead_bytes,
            units: Vec::new(),
        }
    }

    /// Appends `unit` and returns the bytes left afterwards.
    ///
    /// The unit is charged its size plus the per-class overhead; the charge
    /// saturates at zero. A return value of `0` means the frame is full and
    /// must not receive more units. A unit larger than the bytes currently
    /// left is rejected and the frame is left untouched.
    pub fn add_transmit_data(&mut self, unit: TxUnit, is_control: bool) -> Result<u32, FrameError> {
        let unit_bytes = unit.size();
        if unit_bytes > self.bytes_left {
            return Err(FrameError::Overflow {
                unit_bytes,
                bytes_left: self.bytes_left,
            });
        }

        let overhead = if is_control {
            self.control_overhead
        } else {
            self.data_overhead
        };
        self.bytes_left = self
            .bytes_left
            .saturating_sub(unit_bytes.saturating_add(overhead));
        self.units.push(unit);
        Ok(self.bytes_left)
    }

    pub fn bytes_left(&self) -> u32 {
        self.bytes_left
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    pub fn modcod(&self) -> u32 {
        self.modcod
    }

    /// Air time of this frame, taken from the configured parameters of its
    /// length class.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn transmit_data(&self) -> &[TxUnit] {
        &self.units
    }

    pub fn into_transmit_data(self) -> Vec<TxUnit> {
        self.units
    }

    /// Sum of packed unit sizes, excluding accounting overhead.
    pub fn payload_bytes(&self) -> u32 {
        self.units.iter().map(TxUnit::size).sum()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(len: usize) -> TxUnit {
        TxUnit::new(
            Bytes::from(vec![0u8; len]),
            MacAddress::from_index(0),
            MacAddress::from_index(1),
        )
    }

    #[test]
    fn capacities_match_bbframe_lengths() {
        assert_eq!(FrameType::Short.capacity_bytes(), 2025);
        assert_eq!(FrameType::Normal.capacity_bytes(), 8100);
        let frame = BbFrame::new(3, FrameType::Normal, &FrameParams::default());
        assert_eq!(frame.bytes_left(), 8100);
        assert_eq!(frame.capacity(), 8100);
        assert_eq!(frame.modcod(), 3);
        assert!(frame.is_empty());
    }

    #[test]
    fn data_units_consume_their_size() {
        let mut frame = BbFrame::new(3, FrameType::Normal, &FrameParams::default());
        assert_eq!(frame.add_transmit_data(unit(4000), false), Ok(4100));
        assert_eq!(frame.add_transmit_data(unit(3000), false), Ok(1100));
        assert_eq!(frame.payload_bytes(), 7000);
        assert_eq!(frame.unit_count(), 2);
    }

    #[test]
    fn control_units_carry_their_own_overhead() {
        let params = FrameParams::default();
        let mut data = BbFrame::new(3, FrameType::Normal, &params);
        let mut ctrl = BbFrame::new(3, FrameType::Normal, &params);

        let data_left = data.add_transmit_data(unit(50), false).unwrap();
        let ctrl_left = ctrl.add_transmit_data(unit(50), true).unwrap();

        assert_eq!(data_left, 8050);
        assert_eq!(ctrl_left, 8100 - 50 - params.control_overhead_bytes);
        assert_ne!(data_left, ctrl_left);
    }

    #[test]
    fn overhead_saturates_at_zero() {
        let mut frame = BbFrame::new(3, FrameType::Short, &FrameParams::default());
        assert_eq!(frame.add_transmit_data(unit(2020), true), Ok(0));
        assert_eq!(frame.payload_bytes(), 2020);
    }

    #[test]
    fn oversize_unit_is_rejected_without_mutation() {
        let mut frame = BbFrame::new(3, FrameType::Short, &FrameParams::default());
        frame.add_transmit_data(unit(2000), false).unwrap();
        let err = frame.add_transmit_data(unit(26), false).unwrap_err();
        assert_eq!(
            err,
            FrameError::Overflow {
                unit_bytes: 26,
                bytes_left: 25
            }
        );
        assert_eq!(frame.bytes_left(), 25);
        assert_eq!(frame.unit_count(), 1);
    }

    #[test]
    fn duration_follows_length_class() {
        let params = FrameParams::default();
        let short = BbFrame::new(3, FrameType::Short, &params);
        let normal = BbFrame::new(3, FrameType::Normal, &params);
        assert_eq!(short.duration(), params.short_frame_duration);
        assert_eq!(normal.duration(), params.normal_frame_duration);
    }
}
