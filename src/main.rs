use std::process::ExitCode;
use std::time::Duration;

use clap::error::ErrorKind as ClapErrorKind;
use clap::Parser;
use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use drumkit_midi::config::DEFAULT_CLIENT_NAME;
use drumkit_midi::jack_host::JackSession;
use drumkit_midi::monitor::{event_monitor, DEFAULT_MONITOR_CAPACITY};
use drumkit_midi::usb::UsbDrumkit;
use drumkit_midi::{DriverConfig, DriverContext, DrumError, ErrorKind, NoteAssignment, StopFlag};

const MONITOR_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(
    name = "drumkit-midi",
    version,
    about = "Expose a USB drum pad kit as a JACK MIDI output"
)]
struct Args {
    /// Reassign a pad, e.g. `-n 0=36` or `-n 5:0x31`. Repeatable.
    #[arg(short = 'n', long = "note", value_name = "PAD=NOTE")]
    notes: Vec<NoteAssignment>,

    /// Extra reads OR-ed into each pad decision; more catches short hits, adds latency.
    #[arg(short, long, default_value_t = 0, value_name = "N")]
    loop_buffer: usize,

    /// Velocity of every Note-On.
    #[arg(long, default_value_t = 127)]
    velocity: u8,

    /// Per-read USB timeout in milliseconds, 0 blocks forever.
    #[arg(long, default_value_t = 250, value_name = "MS")]
    read_timeout_ms: u64,

    /// JACK client name.
    #[arg(long, default_value = DEFAULT_CLIENT_NAME)]
    client_name: String,

    /// USB vendor id (hex).
    #[arg(long, value_parser = parse_usb_id, default_value = "0x1941")]
    vendor_id: u16,

    /// USB product id (hex).
    #[arg(long, value_parser = parse_usb_id, default_value = "0x8021")]
    product_id: u16,

    /// Log every MIDI event sent.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<DriverConfig, DrumError> {
        Ok(DriverConfig::default()
            .with_assignments(&self.notes)?
            .with_velocity(self.velocity)?
            .with_loop_buffer(self.loop_buffer)?
            .with_read_timeout(Duration::from_millis(self.read_timeout_ms))
            .with_client_name(self.client_name)
            .with_device(self.vendor_id, self.product_id)
            .with_verbose(self.verbose))
    }
}

/// Hex, with or without the `0x` prefix.
fn parse_usb_id(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => u16::from_str_radix(s, 16),
    };
    parsed.map_err(|e| format!("invalid USB id `{s}`: {e}"))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// The handlers only set the flag. A second SIGINT while already stopping
/// exits right away, for when a read is blocked with no timeout.
fn register_signals(stop: &StopFlag) -> std::io::Result<()> {
    let flag = stop.as_arc();
    signal_hook::flag::register_conditional_shutdown(SIGINT, 1, flag.clone())?;
    for sig in [SIGINT, SIGTERM, SIGHUP, SIGQUIT] {
        signal_hook::flag::register(sig, flag.clone())?;
    }
    Ok(())
}

fn run(config: DriverConfig) -> Result<u8, DrumError> {
    let ctx = DriverContext::new(config);
    let config = ctx.config();
    debug!(?config, "configuration");

    if let Err(e) = register_signals(&ctx.stop_flag()) {
        warn!("could not install signal handlers: {e}");
    }

    // acquisition order: USB, then JACK; released in reverse
    let drumkit = UsbDrumkit::open(config.vendor_id, config.product_id, config.read_timeout)?;

    let (translator, monitor) = if config.verbose {
        let (tap, drain) = event_monitor(DEFAULT_MONITOR_CAPACITY);
        (ctx.monitored_translator(tap), Some(drain))
    } else {
        (ctx.translator(), None)
    };
    let session = JackSession::start(&ctx, translator)?;

    let monitor = monitor.and_then(|drain| {
        drain
            .spawn(ctx.stop_flag(), ctx.stats(), MONITOR_INTERVAL)
            .map_err(|e| warn!("could not start event monitor: {e}"))
            .ok()
    });

    info!(
        pads = ?config.mapping.notes(),
        window = config.window_len(),
        "running, press Ctrl-C to quit"
    );

    let mut poller = ctx.poller(drumkit);
    // a poller error is already logged and recorded in the context status
    let _ = poller.run();

    if ctx.failure().is_none() {
        info!("stop requested, shutting down");
    }
    ctx.request_stop();
    if let Some(handle) = monitor {
        if handle.join().is_err() {
            warn!("event monitor panicked");
        }
    }

    session.close();
    drop(poller);

    let stats = ctx.stats();
    debug!(
        emitted = stats.emitted_events(),
        dropped = stats.dropped_events(),
        "done"
    );
    Ok(ctx.exit_code())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => 0,
                _ => ErrorKind::BadConfiguration.exit_code(),
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    init_logging(args.verbose);

    match args.into_config().and_then(run) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
