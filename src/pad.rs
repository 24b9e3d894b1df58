//! Pads, pad bitmasks and the loop-buffer aggregation window.
//!
//! The kit reports every pad in one byte: bit `i` set means pad `i` is
//! currently struck. Only the low [`PAD_COUNT`] bits carry meaning.

use core::fmt;

/// Number of strike zones on the kit.
pub const PAD_COUNT: usize = 6;

/// Bits of a report byte that belong to a pad.
pub const PAD_BITS: u8 = (1 << PAD_COUNT) - 1;

/// Index of one pad, always `< PAD_COUNT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PadIndex(u8);

impl PadIndex {
    /// Returns `None` when `index` is out of range.
    pub const fn new(index: usize) -> Option<Self> {
        if index < PAD_COUNT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    #[inline]
    pub const fn get(self) -> usize {
        self.0 as usize
    }

    /// All pads in ascending order.
    pub fn all() -> impl Iterator<Item = PadIndex> {
        (0..PAD_COUNT as u8).map(PadIndex)
    }
}

impl fmt::Display for PadIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pad {}", self.0)
    }
}

/// Pressed/free state of every pad at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PadStates([bool; PAD_COUNT]);

impl PadStates {
    /// All pads free.
    pub const RELEASED: PadStates = PadStates([false; PAD_COUNT]);

    pub const fn from_array(pressed: [bool; PAD_COUNT]) -> Self {
        Self(pressed)
    }

    /// Decode a report byte. Bits above `PAD_COUNT` are ignored.
    pub fn decode(mask: u8) -> Self {
        let mut pressed = [false; PAD_COUNT];
        for (i, p) in pressed.iter_mut().enumerate() {
            *p = mask & (1 << i) != 0;
        }
        Self(pressed)
    }

    /// Pack back into a mask; the high bits are always clear.
    pub fn encode(&self) -> u8 {
        self.0
            .iter()
            .enumerate()
            .fold(0u8, |mask, (i, &p)| if p { mask | (1 << i) } else { mask })
    }

    #[inline]
    pub fn is_pressed(&self, pad: PadIndex) -> bool {
        self.0[pad.get()]
    }

    #[inline]
    pub fn set(&mut self, pad: PadIndex, pressed: bool) {
        self.0[pad.get()] = pressed;
    }
}

/// OR-combines the pad byte of several reports into one observation.
///
/// A pad struck in any report of the window reads as pressed for the
/// whole window. A press and release inside one window looks the same as
/// a hold; that is the price of not missing short hits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowMask {
    mask: u8,
    samples: usize,
}

impl WindowMask {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, pad_byte: u8) {
        self.mask |= pad_byte;
        self.samples += 1;
    }

    /// Number of reports folded in so far.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Aggregated mask restricted to the pad bits.
    pub fn mask(&self) -> u8 {
        self.mask & PAD_BITS
    }

    pub fn states(&self) -> PadStates {
        PadStates::decode(self.mask)
    }
}

/// Aggregate a whole window of pad bytes at once.
pub fn aggregate<I: IntoIterator<Item = u8>>(pad_bytes: I) -> WindowMask {
    let mut window = WindowMask::new();
    for byte in pad_bytes {
        window.add(byte);
    }
    window
}
