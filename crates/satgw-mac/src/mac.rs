//! Gateway MAC: periodic frame dispatch and inbound delivery.
//!
//! ```text
//!   tick ─▶ dispatch (queued frame │ dummy │ nothing) ─▶ refill queue ─▶ re-arm tick
//! ```
//!
//! The tick interval is constant for the whole run. Each tick re-arms the
//! next one until [`GwMac::stop`] is called.

use std::time::Duration;

use tracing::{debug, info, trace};

use crate::address::MacAddress;
use crate::clock::{TickScheduler, TimerHandle};
use crate::collab::{FrameSink, RxHandler, SchedContextProvider, TxOpportunity};
use crate::config::MacConfig;
use crate::error::MacError;
use crate::frame::TxUnit;
use crate::scheduler::{ForwardScheduler, PackingReport};
use crate::stats::MacStats;

/// The forward link has a single carrier.
pub const FORWARD_CARRIER_ID: u32 = 0;

/// What a tick put on the air.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A frame from the frame queue.
    Queued,
    /// A filler frame; the queue was empty.
    Dummy,
    /// Nothing; the queue was empty and dummy frames are off.
    Idle,
}

/// Result of one timer tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub dispatch: Dispatch,
    pub packing: PackingReport,
}

/// Forward-link MAC of a gateway.
pub struct GwMac<S, K, R> {
    address: MacAddress,
    config: MacConfig,
    scheduler: ForwardScheduler,
    provider: Option<Box<dyn SchedContextProvider>>,
    source: S,
    sink: K,
    rx_handler: R,
    pending_tick: Option<TimerHandle>,
    stats: MacStats,
}

impl<S, K, R> GwMac<S, K, R>
where
    S: TxOpportunity,
    K: FrameSink,
    R: RxHandler,
{
    /// Creates a MAC with the given collaborators. Fails if `config` does not
    /// validate.
    pub fn new(
        address: MacAddress,
        config: MacConfig,
        source: S,
        sink: K,
        rx_handler: R,
    ) -> Result<Self, MacError> {
        config.validate()?;
        Ok(Self {
            address,
            scheduler: ForwardScheduler::new(&config),
            config,
            provider: None,
            source,
            sink,
            rx_handler,
            pending_tick: None,
            stats: MacStats::new(),
        })
    }

    pub fn address(&self) -> MacAddress {
        self.address
    }

    pub fn config(&self) -> &MacConfig {
        &self.config
    }

    pub fn stats(&self) -> &MacStats {
        &self.stats
    }

    pub fn scheduler(&self) -> &ForwardScheduler {
        &self.scheduler
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn rx_handler(&self) -> &R {
        &self.rx_handler
    }

    pub fn is_running(&self) -> bool {
        self.pending_tick.is_some()
    }

    /// Installs or replaces the buffer-status provider. `None` means no
    /// scheduling objects are ever produced.
    pub fn set_sched_context_provider(&mut self, provider: Option<Box<dyn SchedContextProvider>>) {
        self.provider = provider;
    }

    /// Arms the first tick one interval from now.
    pub fn start(&mut self, timers: &mut dyn TickScheduler) {
        if let Some(old) = self.pending_tick.take() {
            timers.cancel(old);
        }
        info!(
            address = %self.address,
            interval_us = self.config.interval.as_micros() as u64,
            mode = %self.config.frame_usage_mode,
            sort = %self.config.sort_criterion,
            dummy_frames = self.config.dummy_frames,
            "forward scheduling started"
        );
        self.pending_tick = Some(timers.schedule(self.config.interval, FORWARD_CARRIER_ID));
    }

    /// Disarms the pending tick. Ticks delivered afterwards are ignored.
    pub fn stop(&mut self, timers: &mut dyn TickScheduler) {
        if let Some(handle) = self.pending_tick.take() {
            timers.cancel(handle);
            info!(address = %self.address, "forward scheduling stopped");
        }
    }

    /// Handles one transmission tick: dispatch, refill, re-arm.
    ///
    /// Returns `None` if the MAC is stopped.
    pub fn on_timer_tick(&mut self, timers: &mut dyn TickScheduler) -> Option<TickOutcome> {
        self.pending_tick.take()?;
        self.stats.ticks += 1;

        let dispatch = self.dispatch();
        let packing = self.build_frames();

        self.pending_tick = Some(timers.schedule(self.config.interval, FORWARD_CARRIER_ID));
        trace!(
            now_us = timers.now().as_micros() as u64,
            ?dispatch,
            queued = self.scheduler.queue_len(),
            "tick"
        );
        Some(TickOutcome { dispatch, packing })
    }

    fn dispatch(&mut self) -> Dispatch {
        let (frame, kind) = match self.scheduler.next_frame() {
            Some(frame) => {
                self.stats.frames_sent += 1;
                self.stats.payload_bytes_sent += u64::from(frame.payload_bytes());
                (frame, Dispatch::Queued)
            }
            None if self.config.dummy_frames => {
                self.stats.dummy_frames_sent += 1;
                (
                    self.scheduler.builder().create_dummy_frame(self.address),
                    Dispatch::Dummy,
                )
            }
            None => {
                self.stats.idle_ticks += 1;
                return Dispatch::Idle;
            }
        };
        let duration: Duration = frame.duration();
        self.sink
            .send_frame(frame.into_transmit_data(), FORWARD_CARRIER_ID, duration);
        kind
    }

    /// Runs one packing pass over the provider's current scheduling objects.
    pub fn build_frames(&mut self) -> PackingReport {
        let Some(provider) = self.provider.as_mut() else {
            return PackingReport::default();
        };
        let objects = provider.scheduling_objects(self.config.sort_criterion);
        if objects.is_empty() {
            return PackingReport::default();
        }
        let report = self.scheduler.build_frames(&objects, &mut self.source);
        self.stats.record_packing(&report);
        report
    }

    /// Delivers inbound units addressed to this MAC or to broadcast.
    ///
    /// Units for other endpoints are dropped. A unit without a MAC tag is
    /// fatal: processing stops there and the error is returned. Returns the
    /// number of delivered units.
    pub fn receive(&mut self, units: Vec<TxUnit>) -> Result<usize, MacError> {
        let mut delivered = 0;
        for (index, unit) in units.into_iter().enumerate() {
            let tag = unit.tag.ok_or(MacError::MissingMacTag { index })?;
            trace!(source = %tag.source, destination = %tag.destination, "unit received");
            if tag.destination == self.address || tag.destination.is_broadcast() {
                self.rx_handler.receive(unit.payload, tag.source);
                self.stats.rx_delivered += 1;
                delivered += 1;
            } else {
                debug!(
                    receiver = %self.address,
                    destination = %tag.destination,
                    "unit intended for others discarded"
                );
                self.stats.rx_discarded += 1;
            }
        }
        Ok(delivered)
    }
}
