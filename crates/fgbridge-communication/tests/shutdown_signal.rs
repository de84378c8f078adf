//! Signal delivery through the shutdown pipe
//!
//! Dispositions are process-wide, so these tests take a lock and use the
//! user signals rather than the real termination set.

use fgbridge_communication::{
    BusClient, EventDispatcher, EventLoop, FrameReader, FrameSink, LoopState, ShutdownSignal,
};
use fgbridge_core::{codec, Frame, FrameResult};
use nix::libc;
use nix::sys::signal::{raise, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::io::{self, Write};
use std::os::unix::net::UnixStream;
use std::sync::Mutex;

static SIGNALS: Mutex<()> = Mutex::new(());

struct NullBus;

impl FrameSink for NullBus {
    fn send_frame(&self, frame: &Frame) -> FrameResult<usize> {
        Ok(frame.encoded_len())
    }
}

impl BusClient for NullBus {
    fn shutdown(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn current_handler(signal: Signal) -> libc::sighandler_t {
    // A null action only reads the disposition.
    let mut current: libc::sigaction = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::sigaction(signal as libc::c_int, std::ptr::null(), &mut current) };
    assert_eq!(rc, 0);
    current.sa_sigaction
}

#[test]
fn test_repeated_signal_stops_loop_once() {
    let _guard = SIGNALS.lock().unwrap_or_else(|e| e.into_inner());

    let (hardware, mut peer) = UnixStream::pair().unwrap();
    let mut shutdown = ShutdownSignal::new().unwrap();
    let hooked = shutdown.install(&[Signal::SIGUSR1]).unwrap();
    assert_eq!(hooked, vec![Signal::SIGUSR1]);

    let frame = Frame::new(3, vec![0xCA, 0xFE]);
    peer.write_all(&codec::encode(&frame).unwrap()).unwrap();

    raise(Signal::SIGUSR1).unwrap();
    raise(Signal::SIGUSR1).unwrap();
    assert!(shutdown.is_requested());

    let mut bus = NullBus;
    let mut lp = EventLoop::new(
        FrameReader::new(hardware, 64),
        &shutdown,
        EventDispatcher::default(),
        &mut bus,
    );
    assert_eq!(lp.turn().unwrap(), LoopState::Stopping);
    assert_eq!(lp.turn().unwrap(), LoopState::Stopping);

    // In-flight data stays on the wire.
    let pending = lp.reader_mut().read_frame().unwrap().expect("frame");
    assert_eq!(pending.frame, frame);
}

#[test]
fn test_ignored_signal_stays_ignored() {
    let _guard = SIGNALS.lock().unwrap_or_else(|e| e.into_inner());

    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    let saved = unsafe { sigaction(Signal::SIGUSR2, &ignore) }.unwrap();

    {
        let mut shutdown = ShutdownSignal::new().unwrap();
        let hooked = shutdown.install(&[Signal::SIGUSR2]).unwrap();
        assert!(hooked.is_empty());
        assert!(shutdown.installed().is_empty());
        assert_eq!(current_handler(Signal::SIGUSR2), libc::SIG_IGN);

        raise(Signal::SIGUSR2).unwrap();
        assert!(!shutdown.is_requested());
    }

    unsafe { sigaction(Signal::SIGUSR2, &saved) }.unwrap();
}

#[test]
fn test_drop_restores_previous_disposition() {
    let _guard = SIGNALS.lock().unwrap_or_else(|e| e.into_inner());

    let before = current_handler(Signal::SIGUSR1);
    {
        let mut shutdown = ShutdownSignal::new().unwrap();
        shutdown.install(&[Signal::SIGUSR1]).unwrap();
        assert_ne!(current_handler(Signal::SIGUSR1), before);

        // Installing twice does not stack handlers.
        assert!(shutdown.install(&[Signal::SIGUSR1]).unwrap().is_empty());
        assert_eq!(shutdown.installed(), vec![Signal::SIGUSR1]);
    }
    assert_eq!(current_handler(Signal::SIGUSR1), before);
}
