//! Termination signals as descriptor readiness (self-pipe)
//!
//! A signal handler may not allocate, lock or log. The handler installed
//! here does one thing: write a single byte into a non-blocking pipe. The
//! read end is polled by the event loop next to the hardware descriptor,
//! so shutdown is observed synchronously in the loop's own context.
//!
//! The pipe is owned by [`ShutdownSignal`]. The handler finds the write end
//! through one atomic descriptor number, which is published by
//! [`ShutdownSignal::install`] and withdrawn on drop before the pipe closes.

use fgbridge_core::{BridgeError, Result};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::ffi::c_int;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicI32, Ordering};

/// Signals that request a graceful stop
pub const TERMINATION_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGHUP, Signal::SIGTERM];

const SENTINEL: u8 = b'x';

/// Write end the handler signals through, -1 when none is installed
static HANDLER_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn on_signal(_signum: c_int) {
    let fd = HANDLER_FD.load(Ordering::Acquire);
    if fd < 0 {
        return;
    }
    let saved = Errno::last_raw();
    // SAFETY: `fd` is the write end of a live ShutdownSignal pipe; Drop
    // clears HANDLER_FD before the descriptor is closed.
    let write_end = unsafe { BorrowedFd::borrow_raw(fd) };
    // A full pipe already holds a pending request.
    let _ = nix::unistd::write(write_end, &[SENTINEL]);
    Errno::set_raw(saved);
}

/// Pollable shutdown request
pub struct ShutdownSignal {
    read: OwnedFd,
    write: OwnedFd,
    installed: Vec<(Signal, SigAction)>,
}

impl ShutdownSignal {
    /// Create the pipe
    ///
    /// Call before [`install`](Self::install) so no signal can arrive
    /// without somewhere to go.
    pub fn new() -> Result<Self> {
        let (read, write) =
            nix::unistd::pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC).map_err(|e| {
                BridgeError::Signal {
                    reason: format!("failed to create shutdown pipe: {}", e),
                }
            })?;

        Ok(Self {
            read,
            write,
            installed: Vec::new(),
        })
    }

    /// Route `signals` into this pipe
    ///
    /// Signals the process inherited as ignored stay ignored. Returns the
    /// signals that were actually hooked. The handler stays installed for
    /// repeated deliveries until this value is dropped.
    pub fn install(&mut self, signals: &[Signal]) -> Result<Vec<Signal>> {
        HANDLER_FD.store(self.write.as_raw_fd(), Ordering::Release);

        let action = SigAction::new(
            SigHandler::Handler(on_signal),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );

        let mut hooked = Vec::new();
        for &signal in signals {
            if self.installed.iter().any(|(s, _)| *s == signal) {
                continue;
            }

            if is_ignored(signal)? {
                tracing::info!("{} is ignored by the parent, leaving it alone", signal);
                continue;
            }

            // SAFETY: `on_signal` only calls write(2) and touches errno,
            // both async-signal-safe.
            let previous =
                unsafe { sigaction(signal, &action) }.map_err(|e| BridgeError::Signal {
                    reason: format!("failed to install {} handler: {}", signal, e),
                })?;

            self.installed.push((signal, previous));
            hooked.push(signal);
        }

        tracing::debug!("Shutdown handlers installed for {:?}", hooked);
        Ok(hooked)
    }

    /// Request shutdown from ordinary code
    pub fn notify(&self) -> Result<()> {
        match nix::unistd::write(&self.write, &[SENTINEL]) {
            Ok(_) | Err(Errno::EAGAIN) => Ok(()),
            Err(e) => Err(BridgeError::Signal {
                reason: format!("failed to signal shutdown: {}", e),
            }),
        }
    }

    /// Check for a pending request without blocking
    pub fn is_requested(&self) -> bool {
        let mut fds = [PollFd::new(self.read.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::ZERO) {
            Ok(n) if n > 0 => fds[0]
                .revents()
                .is_some_and(|r| r.contains(PollFlags::POLLIN)),
            _ => false,
        }
    }

    /// Signals currently routed into this pipe
    pub fn installed(&self) -> Vec<Signal> {
        self.installed.iter().map(|(s, _)| *s).collect()
    }

    fn write_fd(&self) -> RawFd {
        self.write.as_raw_fd()
    }
}

impl AsFd for ShutdownSignal {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.read.as_fd()
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("read", &self.read.as_raw_fd())
            .field("write", &self.write_fd())
            .field("installed", &self.installed())
            .finish()
    }
}

impl Drop for ShutdownSignal {
    fn drop(&mut self) {
        for (signal, previous) in self.installed.drain(..) {
            // SAFETY: puts back the disposition `install` replaced.
            if let Err(e) = unsafe { sigaction(signal, &previous) } {
                tracing::warn!("Failed to restore {} disposition: {}", signal, e);
            }
        }
        let _ = HANDLER_FD.compare_exchange(
            self.write_fd(),
            -1,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Query the current disposition of `signal` without changing it
fn is_ignored(signal: Signal) -> Result<bool> {
    // SAFETY: an all-zero sigaction is a valid out-parameter, and a null
    // `act` makes sigaction(2) read-only.
    let mut current: nix::libc::sigaction = unsafe { std::mem::zeroed() };
    let rc = unsafe { nix::libc::sigaction(signal as c_int, std::ptr::null(), &mut current) };
    Errno::result(rc).map_err(|e| BridgeError::Signal {
        reason: format!("failed to query {} disposition: {}", signal, e),
    })?;
    Ok(current.sa_sigaction == nix::libc::SIG_IGN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_makes_descriptor_readable() {
        let signal = ShutdownSignal::new().unwrap();
        assert!(!signal.is_requested());

        signal.notify().unwrap();
        assert!(signal.is_requested());
    }

    #[test]
    fn test_notify_is_idempotent() {
        let signal = ShutdownSignal::new().unwrap();
        // Far more than a pipe buffer holds; EAGAIN must be swallowed.
        for _ in 0..100_000 {
            signal.notify().unwrap();
        }
        assert!(signal.is_requested());
    }

    #[test]
    fn test_disposition_query_leaves_handler_in_place() {
        let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
        let saved = unsafe { sigaction(Signal::SIGUSR2, &ignore) }.unwrap();

        assert!(is_ignored(Signal::SIGUSR2).unwrap());
        // Asking twice must not have reset it.
        assert!(is_ignored(Signal::SIGUSR2).unwrap());

        let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
        unsafe { sigaction(Signal::SIGUSR2, &default) }.unwrap();
        assert!(!is_ignored(Signal::SIGUSR2).unwrap());

        unsafe { sigaction(Signal::SIGUSR2, &saved) }.unwrap();
    }
}
