//! Frame length selection and dummy-frame synthesis.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::address::MacAddress;
use crate::error::MacError;
use crate::frame::{BbFrame, FrameParams, FrameType, TxUnit, SHORT_FRAME_BYTES};

/// Which BBFrame length classes the scheduler may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameUsageMode {
    /// Only short frames.
    ShortOnly,
    /// Only normal frames.
    #[default]
    NormalOnly,
    /// Short when the pending demand fits a short frame, normal otherwise.
    Adaptive,
}

impl FrameUsageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameUsageMode::ShortOnly => "short",
            FrameUsageMode::NormalOnly => "normal",
            FrameUsageMode::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for FrameUsageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameUsageMode {
    type Err = MacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" | "short_only" | "short_frames" => Ok(FrameUsageMode::ShortOnly),
            "normal" | "normal_only" | "normal_frames" => Ok(FrameUsageMode::NormalOnly),
            "adaptive" | "short_and_normal" | "short_and_normal_frames" => {
                Ok(FrameUsageMode::Adaptive)
            }
            _ => Err(MacError::InvalidFrameUsageMode(s.to_string())),
        }
    }
}

/// Creates frames for one gateway MAC.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    mode: FrameUsageMode,
    modcod: u32,
    params: FrameParams,
}

impl FrameBuilder {
    pub fn new(mode: FrameUsageMode, modcod: u32, params: FrameParams) -> Self {
        Self {
            mode,
            modcod,
            params,
        }
    }

    pub fn mode(&self) -> FrameUsageMode {
        self.mode
    }

    pub fn params(&self) -> &FrameParams {
        &self.params
    }

    /// Picks the length class for `byte_hint` pending bytes and creates an
    /// empty frame of that class.
    pub fn create_frame(&self, byte_hint: u64) -> BbFrame {
        let frame_type = match self.mode {
            FrameUsageMode::ShortOnly => FrameType::Short,
            FrameUsageMode::NormalOnly => FrameType::Normal,
            FrameUsageMode::Adaptive if byte_hint > u64::from(SHORT_FRAME_BYTES) => {
                FrameType::Normal
            }
            FrameUsageMode::Adaptive => FrameType::Short,
        };
        BbFrame::new(self.modcod, frame_type, &self.params)
    }

    /// A short frame filled by a single zero unit sent from and to `own`.
    pub fn create_dummy_frame(&self, own: MacAddress) -> BbFrame {
        let mut frame = BbFrame::new(self.modcod, FrameType::Short, &self.params);
        let filler = TxUnit::new(Bytes::from(vec![0u8; SHORT_FRAME_BYTES as usize]), own, own);
        let added = frame.add_transmit_data(filler, false);
        debug_assert!(added.is_ok(), "dummy filler must fit a short frame");
        frame
    }
}
