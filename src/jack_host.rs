//! JACK client: a MIDI output port fed by the [`Translator`] once per process cycle.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jack::{
    AsyncClient, Client, ClientOptions, ClientStatus, Control, MidiOut, MidiWriter,
    NotificationHandler, Port, ProcessHandler, ProcessScope, RawMidi,
};
use tracing::{debug, info, warn};

use crate::context::DriverContext;
use crate::error::{DrumError, ErrorKind, Result};
use crate::midi::{CycleOutput, OutputFull};
use crate::state::{DriverStats, SharedStatus, StopFlag};
use crate::translator::Translator;

pub const PORT_NAME: &str = "out";

/// A JACK MIDI port buffer for the current cycle.
///
/// Creating the writer already clears the port buffer, so `clear` is a no-op.
struct JackMidiOut<'a>(MidiWriter<'a>);

impl CycleOutput for JackMidiOut<'_> {
    #[inline]
    fn write_event(&mut self, time: u32, bytes: &[u8]) -> core::result::Result<(), OutputFull> {
        self.0.write(&RawMidi { time, bytes }).map_err(|_| OutputFull)
    }
}

/// Realtime process callback.
pub struct DrumProcess {
    port: Port<MidiOut>,
    translator: Translator,
    stats: Arc<DriverStats>,
}

impl ProcessHandler for DrumProcess {
    fn process(&mut self, _: &Client, ps: &ProcessScope) -> Control {
        let mut out = JackMidiOut(self.port.writer(ps));
        let report = self.translator.process(&mut out);
        self.stats.record_cycle(report.emitted, report.dropped);
        Control::Continue
    }
}

/// Watches for the server going away.
///
/// Runs like a signal handler: it only flips atomics and never touches the
/// client, which the main thread tears down (or abandons) on its own.
pub struct ShutdownWatch {
    stop: StopFlag,
    status: Arc<SharedStatus>,
    host_alive: Arc<AtomicBool>,
}

impl NotificationHandler for ShutdownWatch {
    unsafe fn shutdown(&mut self, _status: ClientStatus, _reason: &str) {
        self.host_alive.store(false, Ordering::Release);
        self.status.fail(ErrorKind::RealtimeHostShutdown);
        self.stop.request();
    }
}

/// An activated JACK client. Deactivated and closed on drop.
pub struct JackSession {
    client: Option<AsyncClient<ShutdownWatch, DrumProcess>>,
    host_alive: Arc<AtomicBool>,
}

impl JackSession {
    /// Open a client named after the config, register the MIDI output port
    /// and start calling `translator` every cycle.
    pub fn start(ctx: &DriverContext, translator: Translator) -> Result<Self> {
        let name = &ctx.config().client_name;
        let (client, status) = Client::new(name, ClientOptions::NO_START_SERVER)
            .map_err(|e| DrumError::RealtimeHostUnavailable(format!("{e}, is the JACK server running?")))?;
        debug!(?status, "JACK client opened");

        let port = client
            .register_port(PORT_NAME, MidiOut::default())
            .map_err(|e| DrumError::RealtimeHostUnavailable(format!("register port `{PORT_NAME}`: {e}")))?;

        info!(
            client = client.name(),
            buffer_size = client.buffer_size(),
            sample_rate = client.sample_rate(),
            "JACK MIDI output ready"
        );

        let host_alive = Arc::new(AtomicBool::new(true));
        let watch = ShutdownWatch {
            stop: ctx.stop_flag(),
            status: ctx.status(),
            host_alive: host_alive.clone(),
        };
        let process = DrumProcess {
            port,
            translator,
            stats: ctx.stats(),
        };

        let client = client
            .activate_async(watch, process)
            .map_err(|e| DrumError::RealtimeHostUnavailable(format!("activate: {e}")))?;

        Ok(Self {
            client: Some(client),
            host_alive,
        })
    }

    pub fn host_alive(&self) -> bool {
        self.host_alive.load(Ordering::Acquire)
    }

    /// Deactivate and close now rather than at end of scope.
    pub fn close(self) {}
}

impl Drop for JackSession {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        if !self.host_alive() {
            // the server already dropped us; deactivating a dead client can hang
            debug!("JACK server gone, not deactivating");
            core::mem::forget(client);
            return;
        }
        match client.deactivate() {
            Ok(_) => debug!("JACK client closed"),
            Err(e) => warn!("JACK deactivate: {e}"),
        }
    }
}
