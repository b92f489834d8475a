//! # Address ↔ ID mapper
//!
//! Keeps four independent bijections between MAC addresses and small integer
//! identifiers:
//!
//! | namespace | attach semantics |
//! |-----------|------------------|
//! | trace     | running id, first attach wins, repeat attach is a no-op |
//! | UT        | running id, first attach wins, repeat attach is a no-op |
//! | beam      | caller-supplied id, every attach overwrites |
//! | GW        | caller-supplied id, every attach overwrites |
//!
//! The same address may carry unrelated ids in different namespaces.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::address::MacAddress;
use crate::error::LookupError;

/// One of the four mapping tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdNamespace {
    Trace,
    Ut,
    Beam,
    Gw,
}

impl IdNamespace {
    pub const ALL: [IdNamespace; 4] = [
        IdNamespace::Trace,
        IdNamespace::Ut,
        IdNamespace::Beam,
        IdNamespace::Gw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdNamespace::Trace => "trace",
            IdNamespace::Ut => "ut",
            IdNamespace::Beam => "beam",
            IdNamespace::Gw => "gw",
        }
    }
}

impl fmt::Display for IdNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single address ↔ id bijection.
#[derive(Debug, Default, Clone)]
struct Bijection {
    by_address: BTreeMap<MacAddress, u32>,
    by_id: BTreeMap<u32, MacAddress>,
}

impl Bijection {
    /// Binds `address` to `id`, dropping whatever either side was bound to
    /// before.
    fn bind(&mut self, address: MacAddress, id: u32) {
        if let Some(old_id) = self.by_address.insert(address, id) {
            if old_id != id {
                self.by_id.remove(&old_id);
            }
        }
        if let Some(old_address) = self.by_id.insert(id, address) {
            if old_address != address {
                self.by_address.remove(&old_address);
            }
        }
    }

    fn id(&self, address: &MacAddress) -> Option<u32> {
        self.by_address.get(address).copied()
    }

    fn address(&self, id: u32) -> Option<MacAddress> {
        self.by_id.get(&id).copied()
    }

    fn len(&self) -> usize {
        self.by_id.len()
    }

    fn clear(&mut self) {
        self.by_address.clear();
        self.by_id.clear();
    }
}

/// Registry shared between collaborators that attach and look up endpoints.
pub type SharedIdMapper = Arc<Mutex<IdMapper>>;

/// Bidirectional, namespace-partitioned address ↔ id store.
#[derive(Debug, Default, Clone)]
pub struct IdMapper {
    next_trace_id: u32,
    next_ut_id: u32,
    trace: Bijection,
    ut: Bijection,
    beam: Bijection,
    gw: Bijection,
}

impl IdMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty mapper behind `Arc<Mutex<_>>`.
    pub fn shared() -> SharedIdMapper {
        Arc::new(Mutex::new(Self::new()))
    }

    fn table(&self, namespace: IdNamespace) -> &Bijection {
        match namespace {
            IdNamespace::Trace => &self.trace,
            IdNamespace::Ut => &self.ut,
            IdNamespace::Beam => &self.beam,
            IdNamespace::Gw => &self.gw,
        }
    }

    // ── Attach ──────────────────────────────────────────────────────

    /// Gives `address` the next running trace id unless it already has one.
    /// Returns the address' trace id either way.
    pub fn attach_to_trace(&mut self, address: MacAddress) -> u32 {
        if let Some(id) = self.trace.id(&address) {
            return id;
        }
        let id = self.next_trace_id;
        self.next_trace_id += 1;
        self.trace.bind(address, id);
        trace!(%address, id, "attached to trace id");
        id
    }

    /// Gives `address` the next running UT id unless it already has one.
    /// Returns the address' UT id either way.
    pub fn attach_to_ut(&mut self, address: MacAddress) -> u32 {
        if let Some(id) = self.ut.id(&address) {
            return id;
        }
        let id = self.next_ut_id;
        self.next_ut_id += 1;
        self.ut.bind(address, id);
        trace!(%address, id, "attached to UT id");
        id
    }

    /// Binds `address` to `beam_id`, replacing any earlier binding of either.
    pub fn attach_to_beam(&mut self, address: MacAddress, beam_id: u32) {
        self.beam.bind(address, beam_id);
        trace!(%address, beam_id, "attached to beam id");
    }

    /// Binds `address` to `gw_id`, replacing any earlier binding of either.
    pub fn attach_to_gw(&mut self, address: MacAddress, gw_id: u32) {
        self.gw.bind(address, gw_id);
        trace!(%address, gw_id, "attached to GW id");
    }

    // ── Lookup ──────────────────────────────────────────────────────

    /// Id of `address` in `namespace`.
    pub fn id(&self, namespace: IdNamespace, address: MacAddress) -> Result<u32, LookupError> {
        self.table(namespace)
            .id(&address)
            .ok_or(LookupError::AddressNotFound { namespace, address })
    }

    /// Address bound to `id` in `namespace`.
    pub fn address(&self, namespace: IdNamespace, id: u32) -> Result<MacAddress, LookupError> {
        self.table(namespace)
            .address(id)
            .ok_or(LookupError::IdNotFound { namespace, id })
    }

    pub fn trace_id(&self, address: MacAddress) -> Result<u32, LookupError> {
        self.id(IdNamespace::Trace, address)
    }

    pub fn ut_id(&self, address: MacAddress) -> Result<u32, LookupError> {
        self.id(IdNamespace::Ut, address)
    }

    pub fn beam_id(&self, address: MacAddress) -> Result<u32, LookupError> {
        self.id(IdNamespace::Beam, address)
    }

    pub fn gw_id(&self, address: MacAddress) -> Result<u32, LookupError> {
        self.id(IdNamespace::Gw, address)
    }

    pub fn mac_with_trace_id(&self, id: u32) -> Result<MacAddress, LookupError> {
        self.address(IdNamespace::Trace, id)
    }

    pub fn mac_with_ut_id(&self, id: u32) -> Result<MacAddress, LookupError> {
        self.address(IdNamespace::Ut, id)
    }

    pub fn mac_with_beam_id(&self, id: u32) -> Result<MacAddress, LookupError> {
        self.address(IdNamespace::Beam, id)
    }

    pub fn mac_with_gw_id(&self, id: u32) -> Result<MacAddress, LookupError> {
        self.address(IdNamespace::Gw, id)
    }

    /// Number of bindings in `namespace`.
    pub fn len(&self, namespace: IdNamespace) -> usize {
        self.table(namespace).len()
    }

    pub fn is_empty(&self) -> bool {
        IdNamespace::ALL.iter().all(|ns| self.len(*ns) == 0)
    }

    // ── Diagnostics ─────────────────────────────────────────────────

    /// One-line summary of every id `address` holds, `n/a` where it holds none.
    pub fn describe(&self, address: MacAddress) -> String {
        let mut out = address.to_string();
        for ns in IdNamespace::ALL {
            match self.table(ns).id(&address) {
                Some(id) => {
                    let _ = write!(out, " {}={}", ns, id);
                }
                None => {
                    let _ = write!(out, " {}=n/a", ns);
                }
            }
        }
        out
    }

    /// Every mapping table, each sorted by id.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for ns in IdNamespace::ALL {
            let table = self.table(ns);
            let _ = writeln!(out, "[{}] {} entries", ns, table.len());
            for (id, address) in &table.by_id {
                let _ = writeln!(out, "  {} -> {}", address, id);
            }
        }
        out
    }

    /// Forgets every binding and restarts both running counters at 0.
    pub fn reset(&mut self) {
        self.next_trace_id = 0;
        self.next_ut_id = 0;
        self.trace.clear();
        self.ut.clear();
        self.beam.clear();
        self.gw.clear();
    }
}
