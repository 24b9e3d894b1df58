//! Edge-detecting pad state to MIDI translator, run once per processing cycle.
//!
//! The translator compares the latest published [`PadStates`] against what
//! it last reported and writes one Note-On per newly struck pad and one
//! Note-Off per newly released pad, in ascending pad order. A steady state
//! produces nothing.
//!
//! [`Translator::process`] runs on the realtime thread: it only does an
//! atomic load, a loop over [`PAD_COUNT`](crate::pad::PAD_COUNT) pads and
//! writes into the host's buffer. No locks, no allocation, no I/O.

use std::sync::Arc;

use crate::config::{DriverConfig, PadMapping, MAX_VELOCITY};
use crate::midi::{CycleOutput, MidiEvent, PERCUSSION_CHANNEL};
use crate::monitor::MonitorTap;
use crate::pad::{PadIndex, PadStates};
use crate::state::PadStateCell;

/// Frame offset used for every event: the start of the cycle.
pub const CYCLE_START: u32 = 0;

/// What one invocation did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub emitted: usize,
    /// Events the output buffer refused. They are retried next cycle if the
    /// pad is still in the new state.
    pub dropped: usize,
}

pub struct Translator {
    pads: Arc<PadStateCell>,
    mapping: PadMapping,
    velocity: u8,
    channel: u8,
    /// What the receiver was last told about each pad.
    emitted: PadStates,
    monitor: Option<MonitorTap>,
}

impl Translator {
    pub fn new(pads: Arc<PadStateCell>, mapping: PadMapping) -> Self {
        Self {
            pads,
            mapping,
            velocity: MAX_VELOCITY,
            channel: PERCUSSION_CHANNEL,
            emitted: PadStates::RELEASED,
            monitor: None,
        }
    }

    pub fn from_config(pads: Arc<PadStateCell>, config: &DriverConfig) -> Self {
        Self::new(pads, config.mapping).with_velocity(config.velocity)
    }

    /// Clamped to `1..=127`; a Note-On with velocity 0 would read as a Note-Off.
    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity.clamp(1, MAX_VELOCITY);
        self
    }

    /// Send a copy of every written event to `tap`.
    pub fn with_monitor(mut self, tap: MonitorTap) -> Self {
        self.monitor = Some(tap);
        self
    }

    /// Run one cycle: clear `out`, then emit the changes since the last cycle.
    pub fn process<O: CycleOutput + ?Sized>(&mut self, out: &mut O) -> CycleReport {
        out.clear();
        let current = self.pads.snapshot();
        self.translate(current, out)
    }

    /// Emit the events that bring the receiver from the last reported state to `current`.
    pub fn translate<O: CycleOutput + ?Sized>(
        &mut self,
        current: PadStates,
        out: &mut O,
    ) -> CycleReport {
        let mut report = CycleReport::default();

        for pad in PadIndex::all() {
            let pressed = current.is_pressed(pad);
            if pressed == self.emitted.is_pressed(pad) {
                continue;
            }

            let note = self.mapping.note(pad);
            let event = if pressed {
                MidiEvent::note_on(self.channel, note, self.velocity)
            } else {
                MidiEvent::note_off(self.channel, note)
            };

            match out.write_event(CYCLE_START, &event.bytes()) {
                Ok(()) => {
                    self.emitted.set(pad, pressed);
                    report.emitted += 1;
                    if let Some(tap) = self.monitor.as_mut() {
                        tap.record(event);
                    }
                }
                // leave `emitted` alone so the change is offered again next cycle
                Err(_) => report.dropped += 1,
            }
        }

        report
    }

    /// Last state reported per pad.
    pub fn emitted_state(&self) -> PadStates {
        self.emitted
    }

    pub fn mapping(&self) -> &PadMapping {
        &self.mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{EventBuffer, TimedEvent};
    use crate::monitor::event_monitor;
    use crate::pad::PAD_COUNT;

    fn pad(i: usize) -> PadIndex {
        PadIndex::new(i).unwrap()
    }

    fn pressed(pads: &[usize]) -> PadStates {
        let mut s = PadStates::RELEASED;
        for &p in pads {
            s.set(pad(p), true);
        }
        s
    }

    fn setup() -> (Arc<PadStateCell>, Translator, EventBuffer) {
        let cell = Arc::new(PadStateCell::new());
        let tr = Translator::new(cell.clone(), PadMapping::default());
        (cell, tr, EventBuffer::with_capacity(16))
    }

    fn bytes(buf: &EventBuffer) -> Vec<[u8; 3]> {
        buf.events().iter().map(|e| e.event.bytes()).collect()
    }

    #[test]
    fn nothing_happens_while_released() {
        let (_cell, mut tr, mut buf) = setup();
        assert_eq!(tr.process(&mut buf), CycleReport::default());
        assert!(buf.is_empty());
    }

    #[test]
    fn press_hold_release_gives_one_on_and_one_off() {
        let (cell, mut tr, mut buf) = setup();

        cell.publish(pressed(&[2]));
        tr.process(&mut buf);
        assert_eq!(bytes(&buf), vec![[0x99, 0x22, 0x7f]]);

        // held: no repeat
        tr.process(&mut buf);
        assert!(buf.is_empty());
        tr.process(&mut buf);
        assert!(buf.is_empty());

        cell.publish(PadStates::RELEASED);
        tr.process(&mut buf);
        assert_eq!(bytes(&buf), vec![[0x89, 0x22, 0x00]]);

        tr.process(&mut buf);
        assert!(buf.is_empty());
    }

    #[test]
    fn events_are_in_ascending_pad_order_at_cycle_start() {
        let (cell, mut tr, mut buf) = setup();
        cell.publish(pressed(&[5, 0, 3]));
        let report = tr.process(&mut buf);
        assert_eq!(report.emitted, 3);
        let notes: Vec<u8> = buf.events().iter().map(|e| e.event.note).collect();
        assert_eq!(notes, vec![0x20, 0x23, 0x25]);
        assert!(buf.events().iter().all(|e| e.time == CYCLE_START));
    }

    #[test]
    fn mixed_on_and_off_in_one_cycle() {
        let (cell, mut tr, mut buf) = setup();
        cell.publish(pressed(&[0, 1]));
        tr.process(&mut buf);

        cell.publish(pressed(&[1, 4]));
        tr.process(&mut buf);
        assert_eq!(
            bytes(&buf),
            vec![[0x89, 0x20, 0x00], [0x99, 0x24, 0x7f]]
        );
    }

    #[test]
    fn reassigned_note_is_used() {
        let cell = Arc::new(PadStateCell::new());
        let config = DriverConfig::default().with_note(0, 36).unwrap();
        let mut tr = Translator::from_config(cell.clone(), &config);
        let mut buf = EventBuffer::with_capacity(4);

        cell.publish(pressed(&[0]));
        tr.process(&mut buf);
        cell.publish(PadStates::RELEASED);
        let mut off = EventBuffer::with_capacity(4);
        tr.process(&mut off);

        assert_eq!(bytes(&buf), vec![[0x99, 36, 0x7f]]);
        assert_eq!(bytes(&off), vec![[0x89, 36, 0x00]]);
    }

    #[test]
    fn configured_velocity_is_used() {
        let cell = Arc::new(PadStateCell::new());
        let config = DriverConfig::default().with_velocity(90).unwrap();
        let mut tr = Translator::from_config(cell.clone(), &config);
        let mut buf = EventBuffer::with_capacity(4);
        cell.publish(pressed(&[1]));
        tr.process(&mut buf);
        assert_eq!(bytes(&buf), vec![[0x99, 0x21, 90]]);
    }

    #[test]
    fn silent_velocity_is_clamped() {
        let cell = Arc::new(PadStateCell::new());
        let mut buf = EventBuffer::with_capacity(4);

        let mut tr = Translator::new(cell.clone(), PadMapping::default()).with_velocity(0);
        cell.publish(pressed(&[0]));
        tr.process(&mut buf);
        assert_eq!(bytes(&buf), vec![[0x99, 0x20, 1]]);

        let mut tr = Translator::new(cell.clone(), PadMapping::default()).with_velocity(200);
        tr.process(&mut buf);
        assert_eq!(bytes(&buf), vec![[0x99, 0x20, 0x7f]]);
    }

    #[test]
    fn full_buffer_drops_without_losing_track() {
        let (cell, mut tr, _) = setup();
        let mut tiny = EventBuffer::with_capacity(1);

        cell.publish(pressed(&[0, 1, 2]));
        let report = tr.process(&mut tiny);
        assert_eq!(report, CycleReport { emitted: 1, dropped: 2 });
        assert_eq!(tiny.len(), 1);
        assert_eq!(tr.emitted_state(), pressed(&[0]));

        // the refused pads come through on later cycles, nothing twice
        let mut later = Vec::<TimedEvent>::new();
        for _ in 0..2 {
            tr.process(&mut tiny);
            later.extend_from_slice(tiny.events());
        }
        let notes: Vec<u8> = later.iter().map(|e| e.event.note).collect();
        assert_eq!(notes, vec![0x21, 0x22]);
        assert_eq!(tr.emitted_state(), pressed(&[0, 1, 2]));
        assert_eq!(tr.process(&mut tiny), CycleReport::default());
    }

    #[test]
    fn dropped_press_that_ended_is_never_sent() {
        let (cell, mut tr, _) = setup();
        let mut none = EventBuffer::with_capacity(0);
        cell.publish(pressed(&[3]));
        assert_eq!(tr.process(&mut none).dropped, 1);

        // released before there was room: neither note-on nor a stray note-off
        cell.publish(PadStates::RELEASED);
        let mut buf = EventBuffer::with_capacity(4);
        assert_eq!(tr.process(&mut buf), CycleReport::default());
    }

    #[test]
    fn monitor_sees_written_events_only() {
        let (cell, tr, _) = setup();
        let (tap, mut drain) = event_monitor(8);
        let mut tr = tr.with_monitor(tap);
        let mut tiny = EventBuffer::with_capacity(1);

        cell.publish(pressed(&[0, 1]));
        tr.process(&mut tiny);

        let mut seen = Vec::new();
        drain.drain(|e| seen.push(e));
        assert_eq!(seen, vec![MidiEvent::note_on(PERCUSSION_CHANNEL, 0x20, 127)]);
    }

    #[test]
    fn translate_directly_from_state() {
        let (_cell, mut tr, mut buf) = setup();
        let all = PadStates::from_array([true; PAD_COUNT]);
        assert_eq!(tr.translate(all, &mut buf).emitted, PAD_COUNT);
        assert_eq!(tr.emitted_state(), all);
    }
}
