//! Discrete-event driver for the satgw forward-link MAC.
//!
//! Provides a simulated LLC with per-terminal SDU queues, a recording
//! frame sink, and seeded scenarios that run the MAC on a virtual clock.

pub mod llc;
pub mod scenario;
pub mod sink;

pub use scenario::{run_scenario, Scenario, ScenarioConfig, ScenarioReport};
