//! Driver context: owns everything the poller and the realtime callback share.
//!
//! There are no globals. The context is built from a frozen
//! [`DriverConfig`] and hands out the two halves of the driver:
//!
//! - a [`Poller`], the only writer of the pad states,
//! - a [`Translator`], the only reader, which also owns the last reported state.
//!
//! ```
//! use drumkit_midi::{DriverConfig, DriverContext, EventBuffer};
//! use drumkit_midi::poller::{transport_fn, REPORT_LEN};
//!
//! let ctx = DriverContext::new(DriverConfig::default());
//! let mut poller = ctx.poller(transport_fn(|buf: &mut [u8; REPORT_LEN]| {
//!     buf[0] = 0b0000_0100; // pad 2 struck
//!     Ok(REPORT_LEN)
//! }));
//! let mut translator = ctx.translator();
//!
//! poller.step().unwrap();
//! let mut out = EventBuffer::with_capacity(8);
//! translator.process(&mut out);
//! assert_eq!(out.events()[0].event.bytes(), [0x99, 0x22, 0x7f]);
//! ```

use std::sync::Arc;

use crate::config::DriverConfig;
use crate::error::{DrumError, ErrorKind};
use crate::monitor::MonitorTap;
use crate::poller::{Poller, Transport};
use crate::state::{DriverStats, PadStateCell, SharedStatus, StopFlag};
use crate::translator::Translator;

pub struct DriverContext {
    config: DriverConfig,
    pads: Arc<PadStateCell>,
    stop: StopFlag,
    status: Arc<SharedStatus>,
    stats: Arc<DriverStats>,
}

impl DriverContext {
    /// Pads start out all released.
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            pads: Arc::new(PadStateCell::new()),
            stop: StopFlag::new(),
            status: Arc::new(SharedStatus::new()),
            stats: Arc::new(DriverStats::default()),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn poller<T: Transport>(&self, transport: T) -> Poller<T> {
        Poller::new(
            transport,
            self.config.loop_buffer,
            self.pads.clone(),
            self.stop.clone(),
            self.status.clone(),
        )
    }

    pub fn translator(&self) -> Translator {
        Translator::from_config(self.pads.clone(), &self.config)
    }

    pub fn monitored_translator(&self, tap: MonitorTap) -> Translator {
        self.translator().with_monitor(tap)
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn request_stop(&self) -> bool {
        self.stop.request()
    }

    pub fn status(&self) -> Arc<SharedStatus> {
        self.status.clone()
    }

    pub fn stats(&self) -> Arc<DriverStats> {
        self.stats.clone()
    }

    /// Record a fatal error and ask everything to stop.
    /// Returns `false` if an earlier failure was already recorded.
    pub fn fail(&self, err: &DrumError) -> bool {
        let first = self.status.fail(err.kind());
        self.stop.request();
        first
    }

    pub fn failure(&self) -> Option<ErrorKind> {
        self.status.get()
    }

    /// `0` unless something failed.
    pub fn exit_code(&self) -> u8 {
        self.status.exit_code()
    }
}
