//! Poller thread -> shared pad state -> translator, end to end.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use drumkit_midi::midi::{EventBuffer, MidiEvent};
use drumkit_midi::poller::{transport_fn, REPORT_LEN};
use drumkit_midi::{DriverConfig, DriverContext, DrumError, ErrorKind, ReadError, Translator};

/// `(bytes transferred, pad byte)` as the kit would answer.
type Report = (usize, u8);

/// Start a poller on its own thread, reading reports sent through the returned channel.
/// Dropping the sender looks like the kit being unplugged.
fn spawn_poller(ctx: &DriverContext) -> (Sender<Report>, JoinHandle<Result<(), DrumError>>) {
    let (tx, rx) = mpsc::channel::<Report>();
    let mut poller = ctx.poller(transport_fn(move |buf: &mut [u8; REPORT_LEN]| {
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok((len, pads)) => {
                *buf = [0; REPORT_LEN];
                buf[0] = pads;
                Ok(len)
            }
            Err(RecvTimeoutError::Timeout) => Err(ReadError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(ReadError::Failed("device unplugged".into())),
        }
    }));
    let handle = thread::spawn(move || poller.run());
    (tx, handle)
}

/// Run processing cycles like the host would until `count` events came out.
fn cycle_until(translator: &mut Translator, count: usize) -> Vec<MidiEvent> {
    let mut out = EventBuffer::with_capacity(16);
    let mut events = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while events.len() < count && Instant::now() < deadline {
        translator.process(&mut out);
        events.extend(out.events().iter().map(|e| e.event));
        thread::sleep(Duration::from_millis(1));
    }
    events
}

/// Run a few more cycles and return anything emitted.
fn settle(translator: &mut Translator) -> Vec<MidiEvent> {
    let mut out = EventBuffer::with_capacity(16);
    let mut events = Vec::new();
    for _ in 0..20 {
        translator.process(&mut out);
        events.extend(out.events().iter().map(|e| e.event));
        thread::sleep(Duration::from_millis(1));
    }
    events
}

#[test]
/// Strike and release pad 2, then stop cleanly
fn strike_and_release() {
    let ctx = DriverContext::new(DriverConfig::default());
    let mut translator = ctx.translator();
    let (tx, poller) = spawn_poller(&ctx);

    tx.send((REPORT_LEN, 0b000100)).unwrap();
    assert_eq!(cycle_until(&mut translator, 1), vec![MidiEvent::note_on(9, 0x22, 0x7f)]);

    // held for a while: silence
    tx.send((REPORT_LEN, 0b000100)).unwrap();
    tx.send((REPORT_LEN, 0b000100)).unwrap();
    assert!(settle(&mut translator).is_empty());

    tx.send((REPORT_LEN, 0)).unwrap();
    assert_eq!(cycle_until(&mut translator, 1), vec![MidiEvent::note_off(9, 0x22)]);

    ctx.request_stop();
    poller.join().unwrap().unwrap();
    assert_eq!(ctx.exit_code(), 0);
}

#[test]
/// A pad seen in one read of a three read window still sounds
fn loop_buffer_catches_short_hit() {
    let ctx = DriverContext::new(DriverConfig::default().with_loop_buffer(2).unwrap());
    let mut translator = ctx.translator();
    let (tx, poller) = spawn_poller(&ctx);

    for pads in [0b000001, 0, 0] {
        tx.send((REPORT_LEN, pads)).unwrap();
    }
    assert_eq!(cycle_until(&mut translator, 1), vec![MidiEvent::note_on(9, 0x20, 0x7f)]);

    for _ in 0..3 {
        tx.send((REPORT_LEN, 0)).unwrap();
    }
    assert_eq!(cycle_until(&mut translator, 1), vec![MidiEvent::note_off(9, 0x20)]);

    ctx.request_stop();
    poller.join().unwrap().unwrap();
}

#[test]
/// A hit followed by a timed-out read still lands in its window
fn hit_survives_quiet_gap() {
    let ctx = DriverContext::new(DriverConfig::default().with_loop_buffer(1).unwrap());
    let mut translator = ctx.translator();
    let mut script = vec![Ok(0b000001), Err(ReadError::Timeout), Ok(0), Ok(0), Ok(0)].into_iter();
    let mut poller = ctx.poller(transport_fn(move |buf: &mut [u8; REPORT_LEN]| {
        let pads = script.next().unwrap_or(Err(ReadError::Failed("script done".into())))?;
        *buf = [0; REPORT_LEN];
        buf[0] = pads;
        Ok(REPORT_LEN)
    }));

    let mut out = EventBuffer::with_capacity(16);
    let mut events = Vec::new();
    for _ in 0..2 {
        poller.step().unwrap();
        translator.process(&mut out);
        events.extend(out.events().iter().map(|e| e.event));
    }
    assert_eq!(
        events,
        vec![MidiEvent::note_on(9, 0x20, 0x7f), MidiEvent::note_off(9, 0x20)]
    );
}

#[test]
/// Reassigned notes are what goes out on the wire
fn reassigned_pad_plays_new_note() {
    let config = DriverConfig::default().with_note(0, 36).unwrap();
    let ctx = DriverContext::new(config);
    let mut translator = ctx.translator();
    let (tx, poller) = spawn_poller(&ctx);

    tx.send((REPORT_LEN, 0b000001)).unwrap();
    let on = cycle_until(&mut translator, 1);
    tx.send((REPORT_LEN, 0)).unwrap();
    let off = cycle_until(&mut translator, 1);

    let events: Vec<[u8; 3]> = on.iter().chain(off.iter()).map(MidiEvent::bytes).collect();
    assert_eq!(events, vec![[0x99, 36, 0x7f], [0x89, 36, 0x00]]);

    ctx.request_stop();
    poller.join().unwrap().unwrap();
}

#[test]
/// A short answer kills the poller and freezes the published state
fn short_read_stops_everything() {
    let ctx = DriverContext::new(DriverConfig::default());
    let mut translator = ctx.translator();
    let (tx, poller) = spawn_poller(&ctx);

    tx.send((REPORT_LEN, 0b000010)).unwrap();
    assert_eq!(cycle_until(&mut translator, 1).len(), 1);

    tx.send((REPORT_LEN - 1, 0)).unwrap();
    let err = poller.join().unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolLengthMismatch);
    assert_eq!(ctx.failure(), Some(ErrorKind::ProtocolLengthMismatch));
    assert!(ctx.stop_flag().is_requested());

    // the release after the bad read was never published
    let _ = tx.send((REPORT_LEN, 0));
    assert!(settle(&mut translator).is_empty());
}

#[test]
/// Losing the device is a transfer failure
fn unplugged_kit_is_transfer_failure() {
    let ctx = DriverContext::new(DriverConfig::default());
    let (tx, poller) = spawn_poller(&ctx);
    drop(tx);
    let err = poller.join().unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransferFailed);
    assert_eq!(ctx.exit_code(), ErrorKind::TransferFailed.exit_code());
}
