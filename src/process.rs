use std::fmt;
use std::io::{self, Write};

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, fork, ForkResult, Pid};
use tracing::{debug, warn};

use crate::command::CommandRecord;
use crate::error::ShellError;
use crate::redirects;
use crate::shell::Session;
use crate::signal_handler;

/// How a child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(i32),
}

impl Default for ExitStatus {
    fn default() -> Self {
        ExitStatus::Exited(0)
    }
}

impl ExitStatus {
    /// `None` for states that are not a termination (still running, stopped...).
    pub fn from_wait(status: WaitStatus) -> Option<(Pid, ExitStatus)> {
        match status {
            WaitStatus::Exited(pid, code) => Some((pid, ExitStatus::Exited(code))),
            WaitStatus::Signaled(pid, sig, _) => Some((pid, ExitStatus::Signaled(sig as i32))),
            _ => None,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exit value {}", code),
            ExitStatus::Signaled(sig) => write!(f, "terminated by signal {}", sig),
        }
    }
}

/// Retry a syscall interrupted by a signal (Ctrl-Z lands here).
fn syscall<F, T>(f: F) -> Result<T, nix::Error>
where
    F: Fn() -> Result<T, nix::Error>,
{
    loop {
        match f() {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}

/// Fork and exec one external command, then wait for it or register it as
/// a background job.
pub fn run_external<W: Write>(
    cmd: &CommandRecord,
    session: &mut Session,
    out: &mut W,
) -> Result<(), ShellError> {
    let argv = cmd.to_argv()?;
    if cmd.run_in_background && !session.jobs.has_room() {
        return Err(ShellError::TooManyJobs(session.jobs.capacity()));
    }

    // anything still buffered would otherwise be written twice
    out.flush()?;
    io::stdout().flush()?;

    match unsafe { fork() } {
        Err(e) => Err(ShellError::Fork(e)),
        Ok(ForkResult::Child) => {
            signal_handler::child_dispositions(!cmd.run_in_background);
            redirects::apply(cmd);
            if let Some(program) = argv.first() {
                let _ = execvp(program, &argv);
            }
            eprintln!("{}: no such file or directory", cmd.program);
            unsafe { libc::_exit(1) }
        }
        Ok(ForkResult::Parent { child }) => {
            debug!(pid = %child, program = %cmd.program, background = cmd.run_in_background, "forked");
            if cmd.run_in_background {
                track_background(child, session, out)?;
            } else {
                let status = wait_foreground(child);
                if let ExitStatus::Signaled(_) = status {
                    writeln!(out, "{}", status)?;
                    out.flush()?;
                }
                session.last_status = status;
            }
            Ok(())
        }
    }
}

fn wait_foreground(child: Pid) -> ExitStatus {
    loop {
        match syscall(|| waitpid(child, None)) {
            Ok(status) => {
                if let Some((_, status)) = ExitStatus::from_wait(status) {
                    debug!(pid = %child, %status, "foreground child finished");
                    return status;
                }
            }
            Err(e) => {
                // only reachable if someone else collected the child
                warn!(pid = %child, error = %e, "waitpid on foreground child failed");
                return ExitStatus::Exited(1);
            }
        }
    }
}

fn track_background<W: Write>(child: Pid, session: &mut Session, out: &mut W) -> io::Result<()> {
    match syscall(|| waitpid(child, Some(WaitPidFlag::WNOHANG))) {
        Ok(status) => {
            if let Some((pid, status)) = ExitStatus::from_wait(status) {
                session.jobs.remember_early(pid, status);
            }
        }
        Err(e) => warn!(pid = %child, error = %e, "waitpid on new background child failed"),
    }
    session.jobs.add(child);
    writeln!(out, "background pid is {}", child)?;
    out.flush()
}

/// Collect every child that has already terminated, without blocking, and
/// report each one.
pub fn reap_background<W: Write>(session: &mut Session, out: &mut W) -> io::Result<()> {
    for (pid, status) in session.jobs.take_early() {
        writeln!(out, "background pid {} is done: {}", pid, status)?;
    }

    loop {
        match syscall(|| waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG))) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(status) => match ExitStatus::from_wait(status) {
                Some((pid, status)) => {
                    if !session.jobs.mark_reaped(pid) {
                        debug!(%pid, "reaped a child that was not a tracked job");
                    }
                    writeln!(out, "background pid {} is done: {}", pid, status)?;
                }
                None => break,
            },
            Err(Errno::ECHILD) => break,
            Err(e) => {
                warn!(error = %e, "waitpid sweep failed");
                break;
            }
        }
    }

    out.flush()
}
