use std::os::fd::BorrowedFd;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

const ENTER_NOTICE: &[u8] = b"\nEntering foreground-only mode (& is now ignored)\n";
const EXIT_NOTICE: &[u8] = b"\nExiting foreground-only mode\n";

/// The flag flipped by SIGTSTP. Nothing else writes it.
static FOREGROUND_ONLY: AtomicBool = AtomicBool::new(false);

/// Handle to a foreground-only flag.
///
/// The running shell uses [`ForegroundMode::process`], which the SIGTSTP
/// handler toggles; tests can hand in a flag of their own.
#[derive(Debug, Clone, Copy)]
pub struct ForegroundMode {
    flag: &'static AtomicBool,
}

impl ForegroundMode {
    pub fn process() -> Self {
        Self { flag: &FOREGROUND_ONLY }
    }

    #[cfg(test)]
    pub fn from_static(flag: &'static AtomicBool) -> Self {
        Self { flag }
    }

    /// May change between any two calls; callers sample it once per line.
    pub fn is_active(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Flip the mode and return the new value.
    pub fn toggle(&self) -> bool {
        !self.flag.fetch_xor(true, Ordering::Relaxed)
    }
}

/// Async-signal-safe write to stdout
fn sio_puts(bytes: &[u8]) {
    let stdout = unsafe { BorrowedFd::borrow_raw(libc::STDOUT_FILENO) };
    let _ = nix::unistd::write(stdout, bytes);
}

extern "C" fn handle_sigtstp(_: libc::c_int) {
    if ForegroundMode::process().toggle() {
        sio_puts(ENTER_NOTICE);
    } else {
        sio_puts(EXIT_NOTICE);
    }
}

/// Shell-wide dispositions, installed once before the first prompt.
pub fn install() -> nix::Result<()> {
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    unsafe { sigaction(Signal::SIGINT, &ignore)? };

    let tstp = SigAction::new(
        SigHandler::Handler(handle_sigtstp),
        SaFlags::SA_RESTART,
        SigSet::all(),
    );
    unsafe { sigaction(Signal::SIGTSTP, &tstp)? };

    Ok(())
}

/// Dispositions for a freshly forked child, set before it execs.
///
/// Ctrl-C goes back to default only for foreground commands. Ctrl-Z is
/// ignored in every child so it only ever toggles the shell's mode.
pub fn child_dispositions(foreground: bool) {
    if foreground {
        let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
        let _ = unsafe { sigaction(Signal::SIGINT, &default) };
    }
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    let _ = unsafe { sigaction(Signal::SIGTSTP, &ignore) };
}
