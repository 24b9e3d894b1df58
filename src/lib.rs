//! # drumkit-midi
//!
//! Userspace driver for USB HID drum pad kits that only report a pad
//! bitmask, turning them into a JACK MIDI output.
//!
//! Two threads share one byte of state:
//!
//! - The **poller** blocks on the kit's interrupt endpoint, ORs
//!   `loop_buffer + 1` reports together and publishes the resulting pad
//!   states ([`Poller`]).
//! - The **translator** runs inside the realtime process callback, compares
//!   the published states with what it last reported and writes Note-On /
//!   Note-Off events on the percussion channel ([`Translator`]).
//!
//! The hardware ends live behind features: `usb` for the libusb transport
//! and `jack_host` for the JACK client. Without them the crate still
//! builds, and any [`Transport`] / [`CycleOutput`] can be plugged in.

pub mod config;
pub mod context;
pub mod error;
pub mod midi;
pub mod monitor;
pub mod pad;
pub mod poller;
pub mod state;
pub mod translator;

#[cfg(feature = "jack_host")]
pub mod jack_host;
#[cfg(feature = "usb")]
pub mod usb;

pub use config::{DriverConfig, NoteAssignment, PadMapping};
pub use context::DriverContext;
pub use error::{DrumError, ErrorKind, Result};
pub use midi::{CycleOutput, EventBuffer, MidiEvent};
pub use pad::{PadIndex, PadStates, PAD_COUNT};
pub use poller::{Poller, ReadError, Transport};
pub use state::{PadStateCell, SharedStatus, StopFlag};
pub use translator::{CycleReport, Translator};
