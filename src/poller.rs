//! USB poll loop: read reports, OR them over the aggregation window, publish pad states.

use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::error::{DrumError, Result};
use crate::pad::{PadStates, WindowMask};
use crate::state::{PadStateCell, SharedStatus, StopFlag};

/// Size of one interrupt report.
pub const REPORT_LEN: usize = 8;

/// Byte of the report that carries the pad bitmask.
pub const PAD_BYTE: usize = 0;

/// Why a single read produced no report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadError {
    /// The read timed out. Not fatal and not a sample; the poller re-checks
    /// the stop flag and keeps filling the same window.
    Timeout,
    /// The transport failed. Fatal.
    Failed(String),
}

/// Source of fixed-size reports, usually the kit's interrupt IN endpoint.
pub trait Transport {
    /// Blocking read of one report into `buf`. Returns the number of bytes
    /// transferred, which the poller checks against [`REPORT_LEN`].
    fn read_fixed(&mut self, buf: &mut [u8; REPORT_LEN]) -> core::result::Result<usize, ReadError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read_fixed(&mut self, buf: &mut [u8; REPORT_LEN]) -> core::result::Result<usize, ReadError> {
        (**self).read_fixed(buf)
    }
}

/// [`Transport`] backed by a closure. Handy for replaying captured reports.
pub struct FnTransport<F>(F);

pub fn transport_fn<F>(f: F) -> FnTransport<F>
where
    F: FnMut(&mut [u8; REPORT_LEN]) -> core::result::Result<usize, ReadError>,
{
    FnTransport(f)
}

impl<F> Transport for FnTransport<F>
where
    F: FnMut(&mut [u8; REPORT_LEN]) -> core::result::Result<usize, ReadError>,
{
    fn read_fixed(&mut self, buf: &mut [u8; REPORT_LEN]) -> core::result::Result<usize, ReadError> {
        (self.0)(buf)
    }
}

/// Owns the transport and is the only writer of the shared pad states.
pub struct Poller<T> {
    transport: T,
    window_len: usize,
    pads: Arc<PadStateCell>,
    stop: StopFlag,
    status: Arc<SharedStatus>,
    published: u64,
    last: PadStates,
}

impl<T: Transport> Poller<T> {
    /// `loop_buffer` extra reads are OR-ed into each published state.
    pub fn new(
        transport: T,
        loop_buffer: usize,
        pads: Arc<PadStateCell>,
        stop: StopFlag,
        status: Arc<SharedStatus>,
    ) -> Self {
        Self {
            transport,
            window_len: loop_buffer.saturating_add(1),
            pads,
            stop,
            status,
            published: 0,
            last: PadStates::RELEASED,
        }
    }

    /// Read one aggregation window.
    ///
    /// Timed-out reads are skipped and the window keeps what it already
    /// holds. `Ok(None)` means a stop was requested while waiting, the
    /// partial window is dropped and the published state stands.
    pub fn poll_window(&mut self) -> Result<Option<PadStates>> {
        let mut buf = [0u8; REPORT_LEN];
        let mut window = WindowMask::new();

        while window.samples() < self.window_len {
            match self.transport.read_fixed(&mut buf) {
                Ok(REPORT_LEN) => window.add(buf[PAD_BYTE]),
                Ok(actual) => {
                    return Err(DrumError::ProtocolLengthMismatch {
                        expected: REPORT_LEN,
                        actual,
                    })
                }
                Err(ReadError::Timeout) if self.stop.is_requested() => {
                    trace!(read = window.samples(), "stop requested, window dropped");
                    return Ok(None);
                }
                Err(ReadError::Timeout) => continue,
                Err(ReadError::Failed(reason)) => return Err(DrumError::TransferFailed(reason)),
            }
        }

        Ok(Some(window.states()))
    }

    /// Poll one window and publish the result.
    pub fn step(&mut self) -> Result<()> {
        if let Some(states) = self.poll_window()? {
            self.pads.publish(states);
            self.published += 1;
            if states != self.last {
                debug!("pads changed: {:#08b}", states.encode());
                self.last = states;
            }
        }
        Ok(())
    }

    /// Poll until the stop flag is raised or the transport fails.
    ///
    /// A fatal error is recorded in the shared status and raises the stop
    /// flag before it is returned, so every other part of the driver winds
    /// down too.
    pub fn run(&mut self) -> Result<()> {
        debug!(window = self.window_len, "poller started");
        while !self.stop.is_requested() {
            if let Err(err) = self.step() {
                error!("{err}");
                self.status.fail(err.kind());
                self.stop.request();
                return Err(err);
            }
        }
        debug!(published = self.published, "poller stopped");
        Ok(())
    }

    /// Number of states published so far.
    pub fn published(&self) -> u64 {
        self.published
    }
}
