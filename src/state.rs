//! State shared between the poller thread and the realtime callback.
//!
//! The whole pad array fits in one byte, so it is published as a single
//! atomic store and read as a single atomic load. The reader can never see
//! half of one poll and half of another, and neither side ever waits.

use core::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::ErrorKind;
use crate::pad::PadStates;

/// Latest published pad states, packed as a bitmask.
#[derive(Debug, Default)]
pub struct PadStateCell {
    mask: AtomicU8,
}

impl PadStateCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published state. Only the poller calls this.
    #[inline]
    pub fn publish(&self, states: PadStates) {
        self.mask.store(states.encode(), Ordering::Release);
    }

    /// Latest complete state. Wait-free, safe on the realtime thread.
    #[inline]
    pub fn snapshot(&self) -> PadStates {
        PadStates::decode(self.mask.load(Ordering::Acquire))
    }
}

/// Process wide "please stop" flag.
///
/// Cloning shares the flag. The inner `Arc<AtomicBool>` is exposed so it
/// can be handed to a signal handler that does nothing but set it.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this call was the one that raised the flag.
    #[inline]
    pub fn request(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn as_arc(&self) -> &Arc<AtomicBool> {
        &self.0
    }
}

/// First fatal error recorded by any thread.
#[derive(Debug, Default)]
pub struct SharedStatus {
    code: AtomicU8,
}

impl SharedStatus {
    const OK: u8 = 0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Record `kind` unless something failed first. Returns whether it was recorded.
    pub fn fail(&self, kind: ErrorKind) -> bool {
        self.code
            .compare_exchange(
                Self::OK,
                kind.exit_code(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn get(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.code.load(Ordering::Acquire))
    }

    /// `0` while nothing has failed.
    pub fn exit_code(&self) -> u8 {
        self.get().map_or(Self::OK, ErrorKind::exit_code)
    }
}

/// Counters the realtime side bumps and a normal thread reports.
#[derive(Debug, Default)]
pub struct DriverStats {
    dropped_events: AtomicU64,
    emitted_events: AtomicU64,
}

impl DriverStats {
    #[inline]
    pub fn record_cycle(&self, emitted: usize, dropped: usize) {
        if emitted > 0 {
            self.emitted_events.fetch_add(emitted as u64, Ordering::Relaxed);
        }
        if dropped > 0 {
            self.dropped_events.fetch_add(dropped as u64, Ordering::Relaxed);
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    pub fn emitted_events(&self) -> u64 {
        self.emitted_events.load(Ordering::Relaxed)
    }
}
