//! MIDI messages and the per-cycle output buffer they are written into.

use core::fmt;

/// General MIDI percussion channel (channel 10), zero-based.
pub const PERCUSSION_CHANNEL: u8 = 9;

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

/// Bytes in a note message.
pub const EVENT_LEN: usize = 3;

/// A three byte channel voice message.
///
/// Kept as separate fields until the moment it is copied into the host's
/// buffer; [`bytes`](Self::bytes) is the only place the wire layout exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MidiEvent {
    pub status: u8,
    pub note: u8,
    pub velocity: u8,
}

impl MidiEvent {
    pub const fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            status: NOTE_ON | (channel & 0x0f),
            note: note & 0x7f,
            velocity: velocity & 0x7f,
        }
    }

    /// Note-Off always carries velocity 0.
    pub const fn note_off(channel: u8, note: u8) -> Self {
        Self {
            status: NOTE_OFF | (channel & 0x0f),
            note: note & 0x7f,
            velocity: 0,
        }
    }

    #[inline]
    pub const fn bytes(&self) -> [u8; EVENT_LEN] {
        [self.status, self.note, self.velocity]
    }

    /// Parse a note message; anything else gives `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match *bytes {
            [status, note, velocity]
                if matches!(status & 0xf0, NOTE_ON | NOTE_OFF) && note < 0x80 && velocity < 0x80 =>
            {
                Some(Self {
                    status,
                    note,
                    velocity,
                })
            }
            _ => None,
        }
    }

    #[inline]
    pub const fn channel(&self) -> u8 {
        self.status & 0x0f
    }

    #[inline]
    pub const fn is_note_on(&self) -> bool {
        self.status & 0xf0 == NOTE_ON
    }

    #[inline]
    pub const fn is_note_off(&self) -> bool {
        self.status & 0xf0 == NOTE_OFF
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_note_on() { "note on " } else { "note off" };
        write!(
            f,
            "{kind} ch {:>2} note {:#04x} vel {:>3}",
            self.channel() + 1,
            self.note,
            self.velocity
        )
    }
}

/// The host refused an event for this cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputFull;

/// MIDI output buffer of one processing cycle.
///
/// Implementations are called from the realtime thread and must not
/// allocate or block. Reserving room and filling it are one call, since
/// host bindings generally copy the bytes in.
pub trait CycleOutput {
    /// Empty the buffer before the cycle's events are written. Hosts that
    /// hand out an already cleared buffer can leave this as a no-op.
    fn clear(&mut self) {}

    /// Append `bytes` at frame offset `time` within the cycle.
    fn write_event(&mut self, time: u32, bytes: &[u8]) -> Result<(), OutputFull>;
}

/// An event as stored in an [`EventBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedEvent {
    pub time: u32,
    pub event: MidiEvent,
}

/// Fixed capacity in-memory [`CycleOutput`].
///
/// Storage is allocated up front and never grows, so writing into it from
/// the realtime thread is fine. Refuses events once full, and refuses
/// anything that is not a note message.
#[derive(Clone, Debug)]
pub struct EventBuffer {
    events: Vec<TimedEvent>,
    capacity: usize,
}

impl EventBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl CycleOutput for EventBuffer {
    fn clear(&mut self) {
        self.events.clear();
    }

    fn write_event(&mut self, time: u32, bytes: &[u8]) -> Result<(), OutputFull> {
        if self.events.len() >= self.capacity {
            return Err(OutputFull);
        }
        let event = MidiEvent::from_bytes(bytes).ok_or(OutputFull)?;
        self.events.push(TimedEvent { time, event });
        Ok(())
    }
}
