use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub reserve_ok: Arc<AtomicU64>,
    pub reserve_conflict: Arc<AtomicU64>,

    // rejection reasons
    pub reserve_not_found: Arc<AtomicU64>,
    pub reserve_insufficient: Arc<AtomicU64>,

    pub op_timeouts: Arc<AtomicU64>,

    pub lines_confirmed: Arc<AtomicU64>,
    pub lines_canceled: Arc<AtomicU64>,
}
