//! Error types for the forward-link MAC.
//!
//! Two severities exist:
//! - [`MacError`] is fatal. Configuration that cannot be resolved and inbound
//!   units without addressing metadata stop processing; nothing retries them.
//! - [`FrameError`] and [`LookupError`] are ordinary outcomes that the caller
//!   folds into its own control flow.

use crate::address::MacAddress;
use crate::registry::IdNamespace;

// ── Fatal ───────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum MacError {
    #[error("invalid BBFrame usage mode: {0:?}")]
    InvalidFrameUsageMode(String),
    #[error("invalid scheduling sort criterion: {0:?}")]
    InvalidSortCriterion(String),
    #[error("invalid MAC config: {0}")]
    InvalidConfig(String),
    #[error("MAC tag was not found from the unit at batch index {index}")]
    MissingMacTag { index: usize },
}

// ── Recoverable ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("unit of {unit_bytes} bytes does not fit into {bytes_left} bytes left")]
    Overflow { unit_bytes: u32, bytes_left: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("{namespace} id not found for {address}")]
    AddressNotFound {
        namespace: IdNamespace,
        address: MacAddress,
    },
    #[error("no address attached to {namespace} id {id}")]
    IdNotFound { namespace: IdNamespace, id: u32 },
}
