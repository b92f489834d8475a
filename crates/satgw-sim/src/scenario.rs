//! Deterministic forward-link scenarios.
//!
//! A scenario wires one gateway MAC to a [`SimLlc`], generates per-terminal
//! SDU arrivals from a seeded RNG, and runs the MAC on a [`VirtualClock`] for
//! a fixed simulated duration. Same config and seed give the same report.

use std::path::Path;
use std::sync::MutexGuard;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use satgw_mac::clock::VirtualClock;
use satgw_mac::config::{MacConfig, MacConfigInput};
use satgw_mac::frame::TxUnit;
use satgw_mac::mac::GwMac;
use satgw_mac::registry::{IdMapper, SharedIdMapper};
use satgw_mac::stats::MacStats;
use satgw_mac::MacAddress;

use crate::llc::{LlcHandle, LlcStats, Sdu, SimLlc};
use crate::sink::{InboundLog, RecordingSink, SinkStats};

// ─── Configuration ──────────────────────────────────────────────────────────

/// Shortest accepted inter-arrival or return interval.
const MIN_INTERVAL_MS: f64 = 0.001;

/// Upper bound on SDUs generated for one run.
const MAX_ARRIVALS: usize = 2_000_000;

const MAX_TERMINALS: u32 = 65_536;

/// Scenario file contents. Every key is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub seed: u64,
    /// Simulated run time.
    pub duration_ms: u64,
    pub ut_count: u32,
    pub gw_id: u32,
    pub beam_id: u32,
    pub arrivals: ArrivalConfig,
    /// Gateway MAC settings, same keys as a standalone MAC config.
    pub mac: MacConfigInput,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            duration_ms: 100,
            ut_count: 4,
            gw_id: 0,
            beam_id: 1,
            arrivals: ArrivalConfig::default(),
            mac: MacConfigInput::default(),
        }
    }
}

/// Per-terminal traffic model: exponential inter-arrival times, uniform SDU
/// sizes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArrivalConfig {
    pub mean_interarrival_ms: f64,
    pub min_sdu_bytes: u32,
    pub max_sdu_bytes: u32,
    /// Probability that an SDU is control traffic.
    pub control_share: f64,
    /// If set, every terminal sends one unit to the gateway this often.
    pub return_interval_ms: Option<f64>,
    pub return_unit_bytes: u32,
}

impl Default for ArrivalConfig {
    fn default() -> Self {
        Self {
            mean_interarrival_ms: 0.5,
            min_sdu_bytes: 64,
            max_sdu_bytes: 1500,
            control_share: 0.05,
            return_interval_ms: None,
            return_unit_bytes: 64,
        }
    }
}

impl ScenarioConfig {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let config: ScenarioConfig =
            toml::from_str(input).context("invalid scenario TOML")?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Checks the scenario keys and resolves the `[mac]` section.
    pub fn validate(&self) -> anyhow::Result<MacConfig> {
        let a = &self.arrivals;
        if self.duration_ms == 0 {
            bail!("duration_ms must be positive");
        }
        if self.ut_count == 0 || self.ut_count > MAX_TERMINALS {
            bail!(
                "ut_count must be within 1..={}, got {}",
                MAX_TERMINALS,
                self.ut_count
            );
        }
        let duration_ms = self.duration_ms as f64;
        interval_in_range("mean_interarrival_ms", a.mean_interarrival_ms, duration_ms)?;
        let expected = duration_ms / a.mean_interarrival_ms * f64::from(self.ut_count);
        if expected > (MAX_ARRIVALS / 2) as f64 {
            bail!(
                "traffic model yields about {:.0} SDUs, more than {} per run",
                expected,
                MAX_ARRIVALS / 2
            );
        }
        if a.min_sdu_bytes == 0 || a.min_sdu_bytes > a.max_sdu_bytes {
            bail!(
                "SDU size range {}..={} is empty",
                a.min_sdu_bytes,
                a.max_sdu_bytes
            );
        }
        if !(0.0..=1.0).contains(&a.control_share) {
            bail!("control_share must be within 0..=1, got {}", a.control_share);
        }
        if let Some(iv) = a.return_interval_ms {
            interval_in_range("return_interval_ms", iv, duration_ms)?;
        }
        let mac = self.mac.clone().resolve().context("invalid [mac] section")?;
        Ok(mac)
    }
}

fn interval_in_range(key: &str, value: f64, duration_ms: f64) -> anyhow::Result<()> {
    if !(value.is_finite() && (MIN_INTERVAL_MS..=duration_ms).contains(&value)) {
        bail!(
            "{} must be within {}..={} ms, got {}",
            key,
            MIN_INTERVAL_MS,
            duration_ms,
            value
        );
    }
    Ok(())
}

fn millis(key: &str, value: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value / 1000.0)
        .with_context(|| format!("{} of {} ms is not a valid duration", key, value))
}

// ─── Report ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalReport {
    pub address: MacAddress,
    pub trace_id: u32,
    pub ut_id: u32,
    pub enqueued_bytes: u64,
    pub delivered_bytes: u64,
    pub backlog_bytes: u32,
    pub inbound_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub seed: u64,
    pub duration_ms: u64,
    pub frame_usage_mode: String,
    pub sort_criterion: String,
    pub utilisation: f64,
    pub backlog_bytes: u64,
    pub mac: MacStats,
    pub llc: LlcStats,
    pub sink: SinkStats,
    pub terminals: Vec<TerminalReport>,
}

// ─── Runner ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Arrival {
    at: Duration,
    terminal: usize,
    sdu: Sdu,
}

/// A configured, not yet run scenario.
pub struct Scenario {
    config: ScenarioConfig,
    mac_config: MacConfig,
    gateway: MacAddress,
    terminals: Vec<MacAddress>,
    ids: SharedIdMapper,
}

impl Scenario {
    pub fn new(config: ScenarioConfig) -> anyhow::Result<Self> {
        let mac_config = config.validate()?;
        let gateway = MacAddress::from_index(0);
        let terminals: Vec<MacAddress> =
            (1..=config.ut_count).map(MacAddress::from_index).collect();

        let ids = IdMapper::shared();
        {
            let mut ids = lock(&ids)?;
            ids.attach_to_trace(gateway);
            ids.attach_to_gw(gateway, config.gw_id);
            ids.attach_to_beam(gateway, config.beam_id);
            for terminal in &terminals {
                ids.attach_to_trace(*terminal);
                ids.attach_to_ut(*terminal);
            }
        }

        Ok(Self {
            config,
            mac_config,
            gateway,
            terminals,
            ids,
        })
    }

    /// Registry populated with the gateway and every terminal.
    pub fn ids(&self) -> &SharedIdMapper {
        &self.ids
    }

    fn arrivals(&self) -> anyhow::Result<Vec<Arrival>> {
        let model = &self.config.arrivals;
        let end = Duration::from_millis(self.config.duration_ms);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut arrivals = Vec::new();

        for terminal in 0..self.terminals.len() {
            let mut t = Duration::ZERO;
            loop {
                let u: f64 = rng.random::<f64>();
                let gap_ms = -model.mean_interarrival_ms * (1.0 - u).ln();
                t = match t.checked_add(millis("inter-arrival gap", gap_ms)?) {
                    Some(next) if next < end => next,
                    _ => break,
                };
                if arrivals.len() >= MAX_ARRIVALS {
                    bail!("more than {} SDUs generated", MAX_ARRIVALS);
                }
                let size = rng.random_range(model.min_sdu_bytes..=model.max_sdu_bytes);
                let is_control = rng.random::<f64>() < model.control_share;
                arrivals.push(Arrival {
                    at: t,
                    terminal,
                    sdu: Sdu::new(size, t, is_control),
                });
            }
        }
        arrivals.sort_by_key(|a| (a.at, a.terminal));
        Ok(arrivals)
    }

    pub fn run(&self) -> anyhow::Result<ScenarioReport> {
        let mut llc = SimLlc::new(self.gateway, self.config.seed.wrapping_add(1));
        for terminal in &self.terminals {
            llc.add_terminal(*terminal);
        }
        let llc: LlcHandle = llc.into_handle();

        let mut mac = GwMac::new(
            self.gateway,
            self.mac_config.clone(),
            llc.clone(),
            RecordingSink::new(self.gateway),
            InboundLog::default(),
        )?;
        mac.set_sched_context_provider(Some(Box::new(llc.clone())));

        let arrivals = self.arrivals()?;
        let end = Duration::from_millis(self.config.duration_ms);
        let return_interval = self
            .config
            .arrivals
            .return_interval_ms
            .map(|ms| millis("return_interval_ms", ms))
            .transpose()?;
        let return_bytes = self.config.arrivals.return_unit_bytes as usize;
        let mut next_return = return_interval;
        let mut next_arrival = 0;
        let mut enqueued = vec![0u64; self.terminals.len()];

        info!(
            seed = self.config.seed,
            terminals = self.terminals.len(),
            arrivals = arrivals.len(),
            duration_ms = self.config.duration_ms,
            "scenario starting"
        );

        let mut clock = VirtualClock::new();
        mac.start(&mut clock);
        while let Some(event) = clock.next_event_until(end) {
            while let Some(arrival) = arrivals.get(next_arrival) {
                if arrival.at > event.at {
                    break;
                }
                let terminal = self.terminals[arrival.terminal];
                enqueued[arrival.terminal] += u64::from(arrival.sdu.size);
                llc.with(|l| l.enqueue(terminal, arrival.sdu.clone()));
                next_arrival += 1;
            }

            while let (Some(due), Some(interval)) = (next_return, return_interval) {
                if due > event.at {
                    break;
                }
                let units = self
                    .terminals
                    .iter()
                    .map(|t| TxUnit::new(Bytes::from(vec![0u8; return_bytes]), *t, self.gateway))
                    .collect();
                mac.receive(units)?;
                next_return = Some(due + interval);
            }

            if mac.on_timer_tick(&mut clock).is_none() {
                break;
            }
        }
        mac.stop(&mut clock);

        let ids = lock(&self.ids)?;
        let mut terminals = Vec::with_capacity(self.terminals.len());
        for (i, terminal) in self.terminals.iter().enumerate() {
            terminals.push(TerminalReport {
                address: *terminal,
                trace_id: ids.trace_id(*terminal)?,
                ut_id: ids.ut_id(*terminal)?,
                enqueued_bytes: enqueued[i],
                delivered_bytes: mac.sink().delivered_to(*terminal),
                backlog_bytes: llc.with(|l| l.backlog(*terminal)),
                inbound_bytes: mac.rx_handler().received_from(*terminal),
            });
        }

        let report = ScenarioReport {
            seed: self.config.seed,
            duration_ms: self.config.duration_ms,
            frame_usage_mode: self.mac_config.frame_usage_mode.to_string(),
            sort_criterion: self.mac_config.sort_criterion.to_string(),
            utilisation: mac.stats().utilisation(),
            backlog_bytes: llc.with(|l| l.total_backlog()),
            mac: mac.stats().clone(),
            llc: llc.with(|l| l.stats().clone()),
            sink: mac.sink().stats().clone(),
            terminals,
        };
        debug!(
            frames = report.mac.frames_sent,
            dummies = report.mac.dummy_frames_sent,
            backlog = report.backlog_bytes,
            "scenario finished"
        );
        Ok(report)
    }
}

/// Builds and runs `config` in one go.
pub fn run_scenario(config: ScenarioConfig) -> anyhow::Result<ScenarioReport> {
    Scenario::new(config)?.run()
}

fn lock(ids: &SharedIdMapper) -> anyhow::Result<MutexGuard<'_, IdMapper>> {
    ids.lock().map_err(|_| anyhow!("id mapper lock poisoned"))
}
