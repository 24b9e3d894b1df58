//! Startup configuration: pad-to-note mapping, aggregation window and device ids.
//!
//! Everything in here is validated once, before the poller and the
//! realtime callback start, and is read-only afterwards.

use core::fmt;
use core::str::FromStr;
use core::time::Duration;

use crate::error::{DrumError, Result};
use crate::pad::{PadIndex, PAD_COUNT};

/// Dreamlink foldup drum kit.
pub const DEFAULT_VENDOR_ID: u16 = 0x1941;
pub const DEFAULT_PRODUCT_ID: u16 = 0x8021;

/// Note of pad 0; the other pads follow chromatically.
pub const FIRST_DEFAULT_NOTE: u8 = 0x20;

pub const MAX_NOTE: u8 = 127;
pub const MAX_VELOCITY: u8 = 127;

/// Largest accepted `loop_buffer`. Each extra read adds one report interval of latency.
pub const MAX_LOOP_BUFFER: usize = 1024;

pub const DEFAULT_CLIENT_NAME: &str = "Dreamlink Foldup Drum Kit";
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Which MIDI note each pad plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PadMapping([u8; PAD_COUNT]);

impl PadMapping {
    /// Validates every note.
    pub fn from_notes(notes: [u8; PAD_COUNT]) -> Result<Self> {
        for (pad, &note) in notes.iter().enumerate() {
            check_note(pad, note)?;
        }
        Ok(Self(notes))
    }

    #[inline]
    pub fn note(&self, pad: PadIndex) -> u8 {
        self.0[pad.get()]
    }

    /// Reassign one pad. `pad` and `note` are raw user input and are checked here.
    pub fn assign(&mut self, pad: usize, note: u8) -> Result<()> {
        let index = PadIndex::new(pad).ok_or_else(|| {
            DrumError::BadConfiguration(format!(
                "pad index {pad} out of range (0..{PAD_COUNT})"
            ))
        })?;
        check_note(pad, note)?;
        self.0[index.get()] = note;
        Ok(())
    }

    pub fn notes(&self) -> &[u8; PAD_COUNT] {
        &self.0
    }
}

impl Default for PadMapping {
    fn default() -> Self {
        let mut notes = [0u8; PAD_COUNT];
        for (i, note) in notes.iter_mut().enumerate() {
            *note = FIRST_DEFAULT_NOTE + i as u8;
        }
        Self(notes)
    }
}

fn check_note(pad: usize, note: u8) -> Result<()> {
    if note > MAX_NOTE {
        return Err(DrumError::BadConfiguration(format!(
            "note {note} for pad {pad} out of range (0..={MAX_NOTE})"
        )));
    }
    Ok(())
}

/// A single `PAD=NOTE` reassignment as typed on the command line.
///
/// `PAD:NOTE` is accepted too, and either number may be written in hex
/// with a `0x` prefix. Range checks happen in [`PadMapping::assign`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteAssignment {
    pub pad: usize,
    pub note: u8,
}

impl FromStr for NoteAssignment {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let (pad, note) = s
            .split_once(['=', ':'])
            .ok_or_else(|| format!("expected PAD=NOTE, got `{s}`"))?;
        let pad = parse_number(pad).ok_or_else(|| format!("invalid pad index `{pad}`"))?;
        let note = parse_number(note).ok_or_else(|| format!("invalid note `{note}`"))?;
        let note = u8::try_from(note).map_err(|_| format!("note {note} does not fit in 0..=127"))?;
        Ok(Self {
            pad: pad as usize,
            note,
        })
    }
}

impl fmt::Display for NoteAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.pad, self.note)
    }
}

/// Decimal or `0x`-prefixed hex.
pub(crate) fn parse_number(s: &str) -> Option<u32> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Frozen driver configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverConfig {
    pub mapping: PadMapping,
    /// Extra reads per poll iteration; the window is `loop_buffer + 1` reads.
    pub loop_buffer: usize,
    pub velocity: u8,
    /// `None` blocks forever on each read.
    pub read_timeout: Option<Duration>,
    pub vendor_id: u16,
    pub product_id: u16,
    pub client_name: String,
    /// Log every emitted event.
    pub verbose: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            mapping: PadMapping::default(),
            loop_buffer: 0,
            velocity: MAX_VELOCITY,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            client_name: DEFAULT_CLIENT_NAME.into(),
            verbose: false,
        }
    }
}

impl DriverConfig {
    pub fn with_note(mut self, pad: usize, note: u8) -> Result<Self> {
        self.mapping.assign(pad, note)?;
        Ok(self)
    }

    /// Apply a batch of command line reassignments, in order.
    pub fn with_assignments<'a, I>(mut self, assignments: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a NoteAssignment>,
    {
        for a in assignments {
            self.mapping.assign(a.pad, a.note)?;
        }
        Ok(self)
    }

    pub fn with_loop_buffer(mut self, loop_buffer: usize) -> Result<Self> {
        if loop_buffer > MAX_LOOP_BUFFER {
            return Err(DrumError::BadConfiguration(format!(
                "loop buffer {loop_buffer} out of range (0..={MAX_LOOP_BUFFER})"
            )));
        }
        self.loop_buffer = loop_buffer;
        Ok(self)
    }

    pub fn with_velocity(mut self, velocity: u8) -> Result<Self> {
        if velocity == 0 || velocity > MAX_VELOCITY {
            // velocity 0 would read as a Note-Off to most receivers
            return Err(DrumError::BadConfiguration(format!(
                "velocity {velocity} out of range (1..={MAX_VELOCITY})"
            )));
        }
        self.velocity = velocity;
        Ok(self)
    }

    /// `Duration::ZERO` means no timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = if timeout.is_zero() { None } else { Some(timeout) };
        self
    }

    pub fn with_device(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self.product_id = product_id;
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Number of reads OR-combined per poll iteration.
    #[inline]
    pub fn window_len(&self) -> usize {
        self.loop_buffer.saturating_add(1)
    }
}
