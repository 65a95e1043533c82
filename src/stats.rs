//! Interop counters
//!
//! Relaxed atomics: the numbers are for monitoring, not synchronisation.

use std::sync::atomic::{AtomicUsize, Ordering};

static CALLS_MADE: AtomicUsize = AtomicUsize::new(0);
static MARSHAL_ERRORS: AtomicUsize = AtomicUsize::new(0);
static TRAMPOLINES_CREATED: AtomicUsize = AtomicUsize::new(0);
static TRAMPOLINES_RELEASED: AtomicUsize = AtomicUsize::new(0);
static DESCRIPTORS_INTERNED: AtomicUsize = AtomicUsize::new(0);

/// Interop statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteropStats {
    pub calls_made: usize,
    pub marshal_errors: usize,
    pub trampolines_created: usize,
    pub trampolines_live: usize,
    pub descriptors_interned: usize,
}

/// Snapshot of the process-wide counters
pub fn stats() -> InteropStats {
    let created = TRAMPOLINES_CREATED.load(Ordering::Relaxed);
    let released = TRAMPOLINES_RELEASED.load(Ordering::Relaxed);
    InteropStats {
        calls_made: CALLS_MADE.load(Ordering::Relaxed),
        marshal_errors: MARSHAL_ERRORS.load(Ordering::Relaxed),
        trampolines_created: created,
        trampolines_live: created.saturating_sub(released),
        descriptors_interned: DESCRIPTORS_INTERNED.load(Ordering::Relaxed),
    }
}

#[inline]
pub(crate) fn record_call() {
    CALLS_MADE.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn record_marshal_error() {
    MARSHAL_ERRORS.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn record_trampoline_created() {
    TRAMPOLINES_CREATED.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn record_trampoline_released() {
    TRAMPOLINES_RELEASED.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn record_descriptor_interned() {
    DESCRIPTORS_INTERNED.fetch_add(1, Ordering::Relaxed);
}
