//! Property-based tests for the forward-link packing pass.
//!
//! Random object lists are packed against a backlog source that holds exactly
//! what the objects report, optionally with some destinations refusing every
//! opportunity.

use proptest::prelude::*;
use satgw_mac::builder::FrameUsageMode;
use satgw_mac::collab::SchedulingObject;
use satgw_mac::config::MacConfig;
use satgw_mac::scheduler::ForwardScheduler;
use satgw_mac::test_util::BacklogSource;
use satgw_mac::MacAddress;

// ─── Strategies ──────────────────────────────────────────────────────────────

fn usage_mode() -> impl Strategy<Value = FrameUsageMode> {
    prop_oneof![
        Just(FrameUsageMode::ShortOnly),
        Just(FrameUsageMode::NormalOnly),
        Just(FrameUsageMode::Adaptive),
    ]
}

/// `(backlog, is_control, refuses)` per object.
fn objects() -> impl Strategy<Value = Vec<(u32, bool, bool)>> {
    prop::collection::vec(
        (
            prop_oneof![0u32..100, 100u32..3000, 3000u32..20_000],
            any::<bool>(),
            prop::bool::weighted(0.15),
        ),
        0..12,
    )
}

fn setup(layout: &[(u32, bool, bool)]) -> (Vec<SchedulingObject>, BacklogSource) {
    let mut source = BacklogSource::new(MacAddress::from_index(0));
    let mut objects = Vec::new();
    for (i, &(backlog, is_control, refuses)) in layout.iter().enumerate() {
        let addr = MacAddress::from_index(i as u32 + 1);
        source = source.with_backlog(addr, backlog);
        if refuses {
            source = source.refusing(addr);
        }
        objects.push(SchedulingObject {
            address: addr,
            buffered_bytes: backlog,
            is_control,
        });
    }
    (objects, source)
}

fn scheduler(mode: FrameUsageMode) -> ForwardScheduler {
    ForwardScheduler::new(&MacConfig {
        frame_usage_mode: mode,
        ..MacConfig::default()
    })
}

proptest! {
    #[test]
    fn packed_units_never_exceed_capacity(mode in usage_mode(), layout in objects()) {
        let (objs, mut source) = setup(&layout);
        let mut sched = scheduler(mode);
        sched.build_frames(&objs, &mut source);

        for frame in sched.queued_frames() {
            prop_assert!(frame.payload_bytes() <= frame.capacity());
            prop_assert!(frame.unit_count() > 0);
        }
    }

    #[test]
    fn demand_is_conserved(mode in usage_mode(), layout in objects()) {
        let (objs, mut source) = setup(&layout);
        let mut sched = scheduler(mode);
        let report = sched.build_frames(&objs, &mut source);

        let total: u64 = layout.iter().map(|(b, _, _)| u64::from(*b)).sum();
        prop_assert_eq!(report.initial_demand, total);
        prop_assert_eq!(report.initial_demand, report.processed_bytes + report.unclaimed_bytes);
        prop_assert_eq!(report.frames_built as usize, sched.queue_len());

        let refused: u64 = layout
            .iter()
            .filter(|(_, _, r)| *r)
            .map(|(b, _, _)| u64::from(*b))
            .sum();
        prop_assert_eq!(report.unclaimed_bytes, refused);
        prop_assert_eq!(report.packed_bytes, total - refused);
    }

    #[test]
    fn requests_are_positive_and_fit_a_frame(mode in usage_mode(), layout in objects()) {
        let (objs, mut source) = setup(&layout);
        let mut sched = scheduler(mode);
        sched.build_frames(&objs, &mut source);

        for (bytes, _) in &source.requests {
            prop_assert!(*bytes > 0);
            prop_assert!(*bytes <= satgw_mac::frame::NORMAL_FRAME_BYTES);
        }
    }

    #[test]
    fn first_requests_follow_provider_order(layout in objects()) {
        let (objs, mut source) = setup(&layout);
        let mut sched = scheduler(FrameUsageMode::NormalOnly);
        sched.build_frames(&objs, &mut source);

        let mut first_seen = Vec::new();
        for (_, addr) in &source.requests {
            if !first_seen.contains(addr) {
                first_seen.push(*addr);
            }
        }
        let expected: Vec<MacAddress> = objs
            .iter()
            .filter(|o| o.buffered_bytes > 0)
            .map(|o| o.address)
            .collect();
        prop_assert_eq!(first_seen, expected);
    }
}
