//! # satgw-mac
//!
//! Forward-link medium access for a satellite gateway.
//!
//! Every transmission interval the gateway MAC sends one BBFrame and then
//! refills its frame queue by packing the per-terminal backlogs reported by
//! the LLC into short (2025 B) or normal (8100 B) frames. Unit sizes are
//! negotiated with the LLC one transmission opportunity at a time.
//!
//! ## Crate structure
//!
//! - [`frame`]: BBFrame container, units and MAC tags
//! - [`builder`]: Frame length selection and dummy frames
//! - [`scheduler`]: Greedy packing pass and frame queue
//! - [`mac`]: Tick-driven dispatch, refill and inbound delivery
//! - [`registry`]: Address ↔ trace/UT/beam/GW id mapper
//! - [`collab`]: LLC / PHY collaborator traits
//! - [`clock`]: Timer abstraction and virtual clock
//! - [`config`]: TOML configuration
//! - [`stats`]: MAC counters

pub mod address;
pub mod builder;
pub mod clock;
pub mod collab;
pub mod config;
pub mod error;
pub mod frame;
pub mod mac;
pub mod registry;
pub mod scheduler;
pub mod stats;

pub mod test_util;

pub use address::MacAddress;
pub use error::{FrameError, LookupError, MacError};
