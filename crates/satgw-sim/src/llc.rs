//! Simulated gateway LLC.
//!
//! Holds one FIFO of SDUs per terminal and answers both questions the MAC
//! asks: "what is buffered" (sorted per [`SortCriterion`]) and "give me a unit
//! of at most N bytes for terminal X". SDUs are fragmented across units as
//! needed; a unit may also carry the tail of one SDU and the head of the next.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;
use serde::Serialize;
use tracing::trace;

use satgw_mac::collab::{
    SchedContextProvider, SchedulingObject, SortCriterion, TxOpportunity, TxOpportunityResult,
};
use satgw_mac::frame::TxUnit;
use satgw_mac::MacAddress;

/// One higher-layer packet waiting for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sdu {
    pub size: u32,
    pub enqueued_at: Duration,
    pub is_control: bool,
    /// Bytes of this SDU already handed to the MAC.
    sent: u32,
}

impl Sdu {
    pub fn new(size: u32, enqueued_at: Duration, is_control: bool) -> Self {
        Self {
            size,
            enqueued_at,
            is_control,
            sent: 0,
        }
    }

    fn remaining(&self) -> u32 {
        self.size - self.sent
    }
}

#[derive(Debug, Default)]
struct TerminalQueue {
    sdus: VecDeque<Sdu>,
    buffered: u32,
}

impl TerminalQueue {
    fn head_enqueued_at(&self) -> Option<Duration> {
        self.sdus.front().map(|s| s.enqueued_at)
    }

    fn has_control(&self) -> bool {
        self.sdus.iter().any(|s| s.is_control)
    }
}

/// LLC byte counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LlcStats {
    pub sdus_enqueued: u64,
    pub bytes_enqueued: u64,
    pub sdus_completed: u64,
    pub bytes_sent: u64,
    pub units_built: u64,
    pub opportunities: u64,
    pub empty_opportunities: u64,
}

#[derive(Debug)]
pub struct SimLlc {
    gateway: MacAddress,
    queues: BTreeMap<MacAddress, TerminalQueue>,
    rng: StdRng,
    stats: LlcStats,
}

impl SimLlc {
    pub fn new(gateway: MacAddress, seed: u64) -> Self {
        Self {
            gateway,
            queues: BTreeMap::new(),
            rng: StdRng::seed_from_u64(seed),
            stats: LlcStats::default(),
        }
    }

    /// Registers a terminal so that it shows up in backlog reports.
    pub fn add_terminal(&mut self, terminal: MacAddress) {
        self.queues.entry(terminal).or_default();
    }

    pub fn enqueue(&mut self, terminal: MacAddress, sdu: Sdu) {
        let queue = self.queues.entry(terminal).or_default();
        queue.buffered += sdu.size;
        self.stats.sdus_enqueued += 1;
        self.stats.bytes_enqueued += u64::from(sdu.size);
        queue.sdus.push_back(sdu);
    }

    pub fn backlog(&self, terminal: MacAddress) -> u32 {
        self.queues.get(&terminal).map_or(0, |q| q.buffered)
    }

    pub fn total_backlog(&self) -> u64 {
        self.queues.values().map(|q| u64::from(q.buffered)).sum()
    }

    pub fn stats(&self) -> &LlcStats {
        &self.stats
    }

    /// Wraps `self` for sharing between the MAC's provider and data-source
    /// slots.
    pub fn into_handle(self) -> LlcHandle {
        LlcHandle(Rc::new(RefCell::new(self)))
    }

    fn objects(&mut self, criterion: SortCriterion) -> Vec<SchedulingObject> {
        let mut pending: Vec<(SchedulingObject, Duration)> = self
            .queues
            .iter()
            .filter(|(_, q)| q.buffered > 0)
            .map(|(addr, q)| {
                let object = SchedulingObject {
                    address: *addr,
                    buffered_bytes: q.buffered,
                    is_control: q.has_control(),
                };
                (object, q.head_enqueued_at().unwrap_or_default())
            })
            .collect();

        match criterion {
            SortCriterion::NoSort => {}
            SortCriterion::BufferingDelaySort => pending.sort_by_key(|(_, head)| *head),
            SortCriterion::BufferingLoadSort => {
                pending.sort_by(|(a, _), (b, _)| b.buffered_bytes.cmp(&a.buffered_bytes))
            }
            SortCriterion::RandomSort => {
                let rng = &mut self.rng;
                pending.sort_by_cached_key(|_| rng.random::<u64>());
            }
            SortCriterion::PrioritySort => pending.sort_by(|(a, _), (b, _)| {
                b.is_control
                    .cmp(&a.is_control)
                    .then(b.buffered_bytes.cmp(&a.buffered_bytes))
            }),
        }
        pending.into_iter().map(|(o, _)| o).collect()
    }

    fn opportunity(&mut self, max_bytes: u32, destination: MacAddress) -> TxOpportunityResult {
        self.stats.opportunities += 1;
        let Some(queue) = self.queues.get_mut(&destination) else {
            self.stats.empty_opportunities += 1;
            return TxOpportunityResult::none(0);
        };

        let mut payload = BytesMut::with_capacity(max_bytes.min(queue.buffered) as usize);
        let mut budget = max_bytes;
        while budget > 0 {
            let Some(head) = queue.sdus.front_mut() else {
                break;
            };
            let take = head.remaining().min(budget);
            payload.put_bytes(if head.is_control { 0xC0 } else { 0xD0 }, take as usize);
            head.sent += take;
            budget -= take;
            if head.remaining() == 0 {
                queue.sdus.pop_front();
                self.stats.sdus_completed += 1;
            }
        }

        let size = payload.len() as u32;
        queue.buffered -= size;
        if size == 0 {
            self.stats.empty_opportunities += 1;
            return TxOpportunityResult::none(queue.buffered);
        }
        self.stats.units_built += 1;
        self.stats.bytes_sent += u64::from(size);
        trace!(%destination, max_bytes, size, left = queue.buffered, "unit built");
        TxOpportunityResult {
            unit: Some(TxUnit::new(payload.freeze(), self.gateway, destination)),
            bytes_left: queue.buffered,
        }
    }
}

/// Shared handle to a [`SimLlc`]. Clones refer to the same LLC.
#[derive(Debug, Clone)]
pub struct LlcHandle(Rc<RefCell<SimLlc>>);

impl LlcHandle {
    pub fn with<T>(&self, f: impl FnOnce(&mut SimLlc) -> T) -> T {
        f(&mut self.0.borrow_mut())
    }
}

impl SchedContextProvider for LlcHandle {
    fn scheduling_objects(&mut self, criterion: SortCriterion) -> Vec<SchedulingObject> {
        self.0.borrow_mut().objects(criterion)
    }
}

impl TxOpportunity for LlcHandle {
    fn tx_opportunity(&mut self, max_bytes: u32, destination: MacAddress) -> TxOpportunityResult {
        self.0.borrow_mut().opportunity(max_bytes, destination)
    }
}
