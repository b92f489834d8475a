//! Property-based tests for the address ↔ id mapper.

use proptest::prelude::*;
use satgw_mac::registry::{IdMapper, IdNamespace};
use satgw_mac::MacAddress;

fn address() -> impl Strategy<Value = MacAddress> {
    // A small pool so that repeats are common.
    (0u32..16).prop_map(MacAddress::from_index)
}

proptest! {
    #[test]
    fn ut_ids_are_dense_and_stable(addrs in prop::collection::vec(address(), 0..64)) {
        let mut ids = IdMapper::new();
        let mut first = Vec::new();
        for addr in &addrs {
            let id = ids.attach_to_ut(*addr);
            if !first.contains(addr) {
                prop_assert_eq!(id as usize, first.len());
                first.push(*addr);
            } else {
                let pos = first.iter().position(|a| a == addr).unwrap();
                prop_assert_eq!(id as usize, pos);
            }
        }
        prop_assert_eq!(ids.len(IdNamespace::Ut), first.len());
    }

    #[test]
    fn attached_addresses_round_trip(addrs in prop::collection::vec(address(), 1..32)) {
        let mut ids = IdMapper::new();
        for addr in &addrs {
            let trace = ids.attach_to_trace(*addr);
            let ut = ids.attach_to_ut(*addr);
            prop_assert_eq!(ids.mac_with_trace_id(trace), Ok(*addr));
            prop_assert_eq!(ids.mac_with_ut_id(ut), Ok(*addr));
        }
        for addr in &addrs {
            let trace = ids.trace_id(*addr).unwrap();
            prop_assert_eq!(ids.mac_with_trace_id(trace), Ok(*addr));
        }
    }

    #[test]
    fn beam_bindings_stay_one_to_one(
        bindings in prop::collection::vec((address(), 0u32..8), 0..48),
    ) {
        let mut ids = IdMapper::new();
        for (addr, beam) in &bindings {
            ids.attach_to_beam(*addr, *beam);
            prop_assert_eq!(ids.beam_id(*addr), Ok(*beam));
            prop_assert_eq!(ids.mac_with_beam_id(*beam), Ok(*addr));
        }

        // Every surviving forward entry has a matching reverse entry.
        let mut bound = 0;
        for i in 0..16 {
            let addr = MacAddress::from_index(i);
            if let Ok(beam) = ids.beam_id(addr) {
                prop_assert_eq!(ids.mac_with_beam_id(beam), Ok(addr));
                bound += 1;
            }
        }
        prop_assert_eq!(ids.len(IdNamespace::Beam), bound);
    }

    #[test]
    fn reset_restarts_counters(addrs in prop::collection::vec(address(), 1..16)) {
        let mut ids = IdMapper::new();
        for addr in &addrs {
            ids.attach_to_trace(*addr);
        }
        ids.reset();
        prop_assert!(ids.is_empty());
        prop_assert_eq!(ids.attach_to_trace(addrs[0]), 0);
    }
}
