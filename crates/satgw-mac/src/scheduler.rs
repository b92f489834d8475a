//! Forward-link BBFrame packing.
//!
//! One packing pass turns this round's scheduling objects into completed
//! frames. Exact unit sizes are unknown up front, so every unit is negotiated
//! with the data source for a byte budget and the frame is charged whatever
//! comes back:
//!
//! ```text
//!   objects ─▶ open frame ─▶ room < threshold? ──yes──▶ close, open next
//!                               │ no
//!                  backlog > room? ──yes──▶ ask for `room`, close, stay on object
//!                               │ no
//!                  ask for backlog + 2, advance (close when demand hits 0)
//! ```
//!
//! Demand is the sum of the objects' outstanding backlogs. A pass ends when
//! demand reaches zero; every byte of it is either processed or reported as
//! unclaimed.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::builder::FrameBuilder;
use crate::collab::{SchedulingObject, TxOpportunity};
use crate::config::MacConfig;
use crate::frame::{BbFrame, TxUnit};

/// Extra bytes requested when an object's whole backlog fits the open frame.
/// Without them the data source cannot hand over the full backlog.
pub const NEGOTIATION_MARGIN_BYTES: u32 = 2;

/// Outcome of one packing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackingReport {
    /// Sum of the objects' backlogs at pass start.
    pub initial_demand: u64,
    /// Backlog the data source drained into frames.
    pub processed_bytes: u64,
    /// Backlog left behind because negotiation came up short.
    pub unclaimed_bytes: u64,
    /// Sum of appended unit sizes.
    pub packed_bytes: u64,
    pub frames_built: u64,
    pub negotiations: u64,
}

/// Owns the frame queue and packs scheduling objects into it.
#[derive(Debug)]
pub struct ForwardScheduler {
    builder: FrameBuilder,
    data_min_bytes: u32,
    control_min_bytes: u32,
    queue: VecDeque<BbFrame>,
}

impl ForwardScheduler {
    pub fn new(config: &MacConfig) -> Self {
        Self {
            builder: FrameBuilder::new(
                config.frame_usage_mode,
                config.modcod,
                config.frame.clone(),
            ),
            data_min_bytes: config.data_min_bytes,
            control_min_bytes: config.control_min_bytes,
            queue: VecDeque::new(),
        }
    }

    pub fn builder(&self) -> &FrameBuilder {
        &self.builder
    }

    /// Smallest frame room worth offering to `object`.
    pub fn min_required_bytes(&self, object: &SchedulingObject) -> u32 {
        if object.is_control {
            self.control_min_bytes
        } else {
            self.data_min_bytes
        }
    }

    /// Pops the oldest completed frame.
    pub fn next_frame(&mut self) -> Option<BbFrame> {
        self.queue.pop_front()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_frames(&self) -> impl Iterator<Item = &BbFrame> {
        self.queue.iter()
    }

    /// Packs `objects`, in the given order, into completed frames appended to
    /// the frame queue.
    pub fn build_frames(
        &mut self,
        objects: &[SchedulingObject],
        source: &mut dyn TxOpportunity,
    ) -> PackingReport {
        let mut report = PackingReport::default();
        let mut demand: u64 = objects.iter().map(|o| u64::from(o.buffered_bytes)).sum();
        report.initial_demand = demand;

        let Some(mut idx) = next_pending(objects, 0) else {
            return report;
        };
        let mut remaining = objects[idx].buffered_bytes;
        let mut frame: Option<BbFrame> = None;

        while demand > 0 {
            let object = objects[idx];
            let min_required = self.min_required_bytes(&object);
            let open = frame.get_or_insert_with(|| self.builder.create_frame(demand));
            let room = open.bytes_left();

            let mut advance = false;
            if room < min_required {
                if open.is_empty() {
                    // Even a fresh frame is too small for this object.
                    warn!(
                        address = %object.address,
                        room,
                        min_required,
                        "object cannot be served by an empty frame"
                    );
                    report.unclaimed_bytes += u64::from(remaining);
                    demand -= u64::from(remaining);
                    advance = true;
                } else {
                    self.enqueue(frame.take(), &mut report);
                }
            } else if remaining > room {
                report.negotiations += 1;
                let result = source.tx_opportunity(room, object.address);
                match append(open, result.unit, &object) {
                    Some(unit_bytes) => {
                        report.packed_bytes += u64::from(unit_bytes);
                        let leftover = result.bytes_left.min(remaining - unit_bytes);
                        report.processed_bytes += u64::from(remaining - leftover);
                        demand = demand - u64::from(remaining) + u64::from(leftover);
                        remaining = leftover;
                        advance = remaining == 0;
                    }
                    None => {
                        report.unclaimed_bytes += u64::from(remaining);
                        demand -= u64::from(remaining);
                        advance = true;
                    }
                }
                self.enqueue(frame.take(), &mut report);
            } else {
                let request = remaining.saturating_add(NEGOTIATION_MARGIN_BYTES).min(room);
                report.negotiations += 1;
                let result = source.tx_opportunity(request, object.address);
                match append(open, result.unit, &object) {
                    Some(unit_bytes) => {
                        report.packed_bytes += u64::from(unit_bytes);
                        let leftover = result
                            .bytes_left
                            .min(remaining.saturating_sub(unit_bytes));
                        report.processed_bytes += u64::from(remaining - leftover);
                        report.unclaimed_bytes += u64::from(leftover);
                    }
                    None => {
                        report.unclaimed_bytes += u64::from(remaining);
                        self.enqueue(frame.take(), &mut report);
                    }
                }
                demand -= u64::from(remaining);
                advance = true;
            }

            if advance && demand > 0 {
                match next_pending(objects, idx + 1) {
                    Some(next) => {
                        idx = next;
                        remaining = objects[idx].buffered_bytes;
                    }
                    None => {
                        report.unclaimed_bytes += demand;
                        demand = 0;
                    }
                }
            }
        }
        self.enqueue(frame.take(), &mut report);

        debug!(
            demand = report.initial_demand,
            processed = report.processed_bytes,
            unclaimed = report.unclaimed_bytes,
            frames = report.frames_built,
            queued = self.queue.len(),
            "packing pass done"
        );
        report
    }

    fn enqueue(&mut self, frame: Option<BbFrame>, report: &mut PackingReport) {
        let Some(frame) = frame else {
            return;
        };
        if frame.is_empty() {
            return;
        }
        trace!(
            frame_type = frame.frame_type().as_str(),
            units = frame.unit_count(),
            payload = frame.payload_bytes(),
            bytes_left = frame.bytes_left(),
            "frame queued"
        );
        report.frames_built += 1;
        self.queue.push_back(frame);
    }
}

/// First object at or after `from` with a non-zero backlog.
fn next_pending(objects: &[SchedulingObject], from: usize) -> Option<usize> {
    (from..objects.len()).find(|&i| objects[i].buffered_bytes > 0)
}

/// Appends a negotiated unit, returning its size. Empty or oversize units
/// count as no unit.
fn append(frame: &mut BbFrame, unit: Option<TxUnit>, object: &SchedulingObject) -> Option<u32> {
    let unit = unit.filter(|u| u.size() > 0)?;
    let size = unit.size();
    match frame.add_transmit_data(unit, object.is_control) {
        Ok(_) => Some(size),
        Err(err) => {
            warn!(address = %object.address, %err, "data source returned an oversize unit");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::MacAddress;
    use crate::builder::FrameUsageMode;
    use crate::frame::FrameType;
    use crate::test_util::BacklogSource;

    fn mac(i: u32) -> MacAddress {
        MacAddress::from_index(i)
    }

    fn gw() -> MacAddress {
        mac(0)
    }

    fn scheduler() -> ForwardScheduler {
        ForwardScheduler::new(&MacConfig::default())
    }

    fn assert_conserved(report: &PackingReport) {
        assert_eq!(
            report.initial_demand,
            report.processed_bytes + report.unclaimed_bytes,
            "{report:?}"
        );
    }

    #[test]
    fn two_data_objects_share_one_normal_frame() {
        let mut sched = scheduler();
        let mut src = BacklogSource::new(gw())
            .with_backlog(mac(1), 4000)
            .with_backlog(mac(2), 3000);
        let objects = [
            SchedulingObject::data(mac(1), 4000),
            SchedulingObject::data(mac(2), 3000),
        ];

        let report = sched.build_frames(&objects, &mut src);

        assert_eq!(sched.queue_len(), 1);
        assert_eq!(report.frames_built, 1);
        assert_eq!(src.requests, vec![(4002, mac(1)), (3002, mac(2))]);
        let frame = sched.next_frame().unwrap();
        assert_eq!(frame.frame_type(), FrameType::Normal);
        assert_eq!(frame.unit_count(), 2);
        assert_eq!(frame.bytes_left(), 1100);
        assert_conserved(&report);
        assert_eq!(report.unclaimed_bytes, 0);
    }

    #[test]
    fn control_object_is_charged_control_overhead() {
        let mut sched = scheduler();
        let mut src = BacklogSource::new(gw()).with_backlog(mac(1), 50);
        let objects = [SchedulingObject::control(mac(1), 50)];
        assert!(sched.min_required_bytes(&objects[0]) == 500);

        sched.build_frames(&objects, &mut src);

        assert_eq!(src.requests, vec![(52, mac(1))]);
        let frame = sched.next_frame().unwrap();
        let overhead = sched.builder().params().control_overhead_bytes;
        assert_eq!(frame.bytes_left(), 8100 - 50 - overhead);
        assert_ne!(frame.bytes_left(), 8100 - 50);
    }

    #[test]
    fn empty_object_list_leaves_queue_untouched() {
        let mut sched = scheduler();
        let mut src = BacklogSource::new(gw());
        let report = sched.build_frames(&[], &mut src);
        assert_eq!(report, PackingReport::default());
        assert_eq!(sched.queue_len(), 0);
        assert!(src.requests.is_empty());
    }

    #[test]
    fn large_backlog_spans_frames() {
        let mut sched = scheduler();
        let mut src = BacklogSource::new(gw()).with_backlog(mac(1), 10_000);
        let objects = [SchedulingObject::data(mac(1), 10_000)];

        let report = sched.build_frames(&objects, &mut src);

        assert_eq!(src.requests, vec![(8100, mac(1)), (1902, mac(1))]);
        assert_eq!(report.frames_built, 2);
        let first = sched.next_frame().unwrap();
        let second = sched.next_frame().unwrap();
        assert_eq!(first.payload_bytes(), 8100);
        assert_eq!(second.payload_bytes(), 1900);
        assert_eq!(src.remaining(mac(1)), 0);
        assert_conserved(&report);
    }

    #[test]
    fn object_below_threshold_gets_fresh_frame() {
        let mut sched = scheduler();
        let mut src = BacklogSource::new(gw())
            .with_backlog(mac(1), 8097)
            .with_backlog(mac(2), 100);
        let objects = [
            SchedulingObject::data(mac(1), 8097),
            SchedulingObject::control(mac(2), 100),
        ];

        let report = sched.build_frames(&objects, &mut src);

        assert_eq!(report.frames_built, 2);
        assert_eq!(sched.next_frame().unwrap().bytes_left(), 3);
        let second = sched.next_frame().unwrap();
        assert_eq!(second.unit_count(), 1);
        assert_eq!(second.payload_bytes(), 100);
        assert_conserved(&report);
    }

    #[test]
    fn refused_negotiation_is_unclaimed_and_packing_continues() {
        let mut sched = scheduler();
        let mut src = BacklogSource::new(gw())
            .with_backlog(mac(1), 1000)
            .with_backlog(mac(2), 500)
            .refusing(mac(1));
        let objects = [
            SchedulingObject::data(mac(1), 1000),
            SchedulingObject::data(mac(2), 500),
        ];

        let report = sched.build_frames(&objects, &mut src);

        assert_eq!(report.unclaimed_bytes, 1000);
        assert_eq!(report.processed_bytes, 500);
        assert_eq!(sched.queue_len(), 1);
        let frame = sched.next_frame().unwrap();
        assert_eq!(frame.unit_count(), 1);
        assert_eq!(frame.transmit_data()[0].tag.unwrap().destination, mac(2));
    }

    #[test]
    fn refusal_mid_frame_closes_it_early() {
        let mut sched = scheduler();
        let mut src = BacklogSource::new(gw())
            .with_backlog(mac(1), 1000)
            .with_backlog(mac(2), 500)
            .with_backlog(mac(3), 700)
            .refusing(mac(2));
        let objects = [
            SchedulingObject::data(mac(1), 1000),
            SchedulingObject::data(mac(2), 500),
            SchedulingObject::data(mac(3), 700),
        ];

        let report = sched.build_frames(&objects, &mut src);

        assert_eq!(report.frames_built, 2);
        assert_eq!(sched.next_frame().unwrap().payload_bytes(), 1000);
        assert_eq!(sched.next_frame().unwrap().payload_bytes(), 700);
        assert_conserved(&report);
    }

    #[test]
    fn provider_order_is_processing_order() {
        let mut sched = scheduler();
        let order = [mac(5), mac(3), mac(9), mac(1)];
        let mut src = BacklogSource::new(gw());
        let mut objects = Vec::new();
        for addr in order {
            src = src.with_backlog(addr, 100);
            objects.push(SchedulingObject::data(addr, 100));
        }

        sched.build_frames(&objects, &mut src);

        let seen: Vec<MacAddress> = src.requests.iter().map(|(_, a)| *a).collect();
        assert_eq!(seen, order);
    }

    #[test]
    fn zero_backlog_objects_are_never_asked() {
        let mut sched = scheduler();
        let mut src = BacklogSource::new(gw()).with_backlog(mac(2), 10);
        let objects = [
            SchedulingObject::data(mac(1), 0),
            SchedulingObject::data(mac(2), 10),
            SchedulingObject::data(mac(3), 0),
        ];

        sched.build_frames(&objects, &mut src);

        assert_eq!(src.requests, vec![(12, mac(2))]);
        assert!(src.requests.iter().all(|(bytes, _)| *bytes > 0));
    }

    #[test]
    fn margin_never_exceeds_frame_room() {
        let mut sched = scheduler();
        let mut src = BacklogSource::new(gw()).with_backlog(mac(1), 8100);
        let objects = [SchedulingObject::data(mac(1), 8100)];

        let report = sched.build_frames(&objects, &mut src);

        assert_eq!(src.requests, vec![(8100, mac(1))]);
        assert_eq!(report.frames_built, 1);
        assert_eq!(sched.next_frame().unwrap().bytes_left(), 0);
    }

    #[test]
    fn adaptive_mode_sizes_by_demand() {
        let config = MacConfig {
            frame_usage_mode: FrameUsageMode::Adaptive,
            ..MacConfig::default()
        };
        let mut sched = ForwardScheduler::new(&config);
        let mut src = BacklogSource::new(gw()).with_backlog(mac(1), 1500);
        sched.build_frames(&[SchedulingObject::data(mac(1), 1500)], &mut src);
        assert_eq!(sched.next_frame().unwrap().frame_type(), FrameType::Short);

        let mut src = BacklogSource::new(gw()).with_backlog(mac(1), 5000);
        sched.build_frames(&[SchedulingObject::data(mac(1), 5000)], &mut src);
        assert_eq!(sched.next_frame().unwrap().frame_type(), FrameType::Normal);
    }

    #[test]
    fn short_only_spreads_over_short_frames() {
        let config = MacConfig {
            frame_usage_mode: FrameUsageMode::ShortOnly,
            ..MacConfig::default()
        };
        let mut sched = ForwardScheduler::new(&config);
        let mut src = BacklogSource::new(gw()).with_backlog(mac(1), 5000);
        let report = sched.build_frames(&[SchedulingObject::data(mac(1), 5000)], &mut src);

        assert_eq!(report.frames_built, 3);
        let sizes: Vec<u32> = sched.queued_frames().map(|f| f.payload_bytes()).collect();
        assert_eq!(sizes, vec![2025, 2025, 950]);
        assert!(sched.queued_frames().all(|f| f.frame_type() == FrameType::Short));
    }

    #[test]
    fn overstated_leftover_is_clamped_to_backlog() {
        // The source claims far more than it holds after every unit.
        let mut sched = scheduler();
        let mut inner = BacklogSource::new(gw()).with_backlog(mac(1), 10_000);
        let mut requests = Vec::new();
        let mut src = |max_bytes: u32, destination: MacAddress| {
            requests.push((max_bytes, destination));
            let mut out = inner.tx_opportunity(max_bytes, destination);
            out.bytes_left = u32::MAX;
            out
        };

        let report = sched.build_frames(&[SchedulingObject::data(mac(1), 10_000)], &mut src);

        assert_eq!(requests, vec![(8100, mac(1)), (1902, mac(1))]);
        assert_eq!(
            report,
            PackingReport {
                initial_demand: 10_000,
                processed_bytes: 10_000,
                unclaimed_bytes: 0,
                packed_bytes: 10_000,
                frames_built: 2,
                negotiations: 2,
            }
        );
        assert_conserved(&report);
    }

    #[test]
    fn short_unit_in_fitting_frame_leaves_rest_unclaimed() {
        // Units are capped at 600 bytes whatever the request.
        let mut sched = scheduler();
        let mut inner = BacklogSource::new(gw())
            .with_backlog(mac(1), 1000)
            .with_backlog(mac(2), 300);
        let mut requests = Vec::new();
        let mut src = |max_bytes: u32, destination: MacAddress| {
            requests.push((max_bytes, destination));
            inner.tx_opportunity(max_bytes.min(600), destination)
        };
        let objects = [
            SchedulingObject::data(mac(1), 1000),
            SchedulingObject::data(mac(2), 300),
        ];

        let report = sched.build_frames(&objects, &mut src);

        assert_eq!(requests, vec![(1002, mac(1)), (302, mac(2))]);
        assert_eq!(report.initial_demand, 1300);
        assert_eq!(report.processed_bytes, 900);
        assert_eq!(report.unclaimed_bytes, 400);
        assert_eq!(report.packed_bytes, 900);
        assert_eq!(report.frames_built, 1);
        assert_conserved(&report);
        assert_eq!(sched.next_frame().unwrap().unit_count(), 2);
    }

    #[test]
    fn stale_object_backlog_is_unclaimed() {
        // The object claims more than the data source actually holds.
        let mut sched = scheduler();
        let mut src = BacklogSource::new(gw()).with_backlog(mac(1), 300);
        let report = sched.build_frames(&[SchedulingObject::data(mac(1), 400)], &mut src);

        assert_eq!(report.packed_bytes, 300);
        assert_eq!(report.processed_bytes, 400);
        assert_conserved(&report);
        assert_eq!(sched.queue_len(), 1);
    }
}
