//! Event monitor: a copy of every emitted MIDI event, logged off the realtime thread.
//!
//! The realtime callback may not log, so it pushes events into an `rtrb`
//! ring and a normal thread drains and logs them. If the ring is full the
//! monitored copy is dropped; the MIDI output itself is unaffected.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, info, warn};

use crate::midi::MidiEvent;
use crate::state::{DriverStats, StopFlag};

/// Room for a few seconds of furious drumming.
pub const DEFAULT_MONITOR_CAPACITY: usize = 256;

/// Realtime half: never blocks, never allocates.
pub struct MonitorTap {
    producer: Producer<MidiEvent>,
}

impl MonitorTap {
    /// Returns `false` if the copy had to be dropped.
    #[inline]
    pub fn record(&mut self, event: MidiEvent) -> bool {
        self.producer.push(event).is_ok()
    }
}

/// Non-realtime half.
pub struct MonitorDrain {
    consumer: Consumer<MidiEvent>,
    reported_drops: u64,
}

/// Create a connected tap and drain.
pub fn event_monitor(capacity: usize) -> (MonitorTap, MonitorDrain) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    (
        MonitorTap { producer },
        MonitorDrain {
            consumer,
            reported_drops: 0,
        },
    )
}

impl MonitorDrain {
    /// Hand every pending event to `f`, oldest first.
    pub fn drain(&mut self, mut f: impl FnMut(MidiEvent)) -> usize {
        let mut count = 0;
        while let Ok(event) = self.consumer.pop() {
            f(event);
            count += 1;
        }
        count
    }

    /// Log every pending event.
    pub fn log_pending(&mut self) -> usize {
        self.drain(|event| info!("{event}"))
    }

    /// Warn when the realtime side dropped output since the last call.
    /// Returns the number of newly dropped events.
    pub fn report_drops(&mut self, stats: &DriverStats) -> u64 {
        let total = stats.dropped_events();
        let new = total.saturating_sub(self.reported_drops);
        if new > 0 {
            warn!(new, total, "MIDI output buffer full, events dropped");
            self.reported_drops = total;
        }
        new
    }

    /// Poll every `interval` on a dedicated thread until `stop` is raised.
    pub fn spawn(
        mut self,
        stop: StopFlag,
        stats: Arc<DriverStats>,
        interval: Duration,
    ) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("drumkit-monitor".into())
            .spawn(move || {
                debug!("event monitor started");
                while !stop.is_requested() {
                    self.log_pending();
                    self.report_drops(&stats);
                    thread::sleep(interval);
                }
                self.log_pending();
                self.report_drops(&stats);
                debug!(emitted = stats.emitted_events(), "event monitor stopped");
            })
    }
}
