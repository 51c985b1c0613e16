use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use crate::command::CommandRecord;

const NULL_DEVICE: &str = "/dev/null";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdin,
    Stdout,
}

impl Stream {
    fn fd(self) -> RawFd {
        match self {
            Stream::Stdin => libc::STDIN_FILENO,
            Stream::Stdout => libc::STDOUT_FILENO,
        }
    }
}

/// Where one standard stream of the child should come from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RedirectPlan<'a> {
    Inherit,
    File(&'a str),
    Null,
}

fn plan<'a>(target: Option<&'a str>, null_fallback: bool) -> RedirectPlan<'a> {
    match target {
        Some(path) => RedirectPlan::File(path),
        None if null_fallback => RedirectPlan::Null,
        None => RedirectPlan::Inherit,
    }
}

/// Plans for stdin and stdout. The null device only stands in when a
/// background command names no redirect at all; one explicit redirect
/// leaves the other stream inherited.
fn plans(cmd: &CommandRecord) -> (RedirectPlan<'_>, RedirectPlan<'_>) {
    let null_fallback = cmd.run_in_background
        && cmd.input_redirect.is_none()
        && cmd.output_redirect.is_none();
    (
        plan(cmd.input_redirect.as_deref(), null_fallback),
        plan(cmd.output_redirect.as_deref(), null_fallback),
    )
}

fn open_input(path: &str) -> io::Result<File> {
    File::open(path)
}

fn open_output(path: &str) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)
}

fn open_null(stream: Stream) -> io::Result<File> {
    match stream {
        Stream::Stdin => File::open(NULL_DEVICE),
        Stream::Stdout => OpenOptions::new().write(true).open(NULL_DEVICE),
    }
}

/// Point `stream` at `file`. The original handle is closed when `file` drops.
fn install(file: File, stream: Stream) -> io::Result<()> {
    let rc = unsafe { libc::dup2(file.as_raw_fd(), stream.fd()) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn fail(message: String) -> ! {
    eprintln!("{}", message);
    unsafe { libc::_exit(1) }
}

fn apply_stream(plan: RedirectPlan<'_>, stream: Stream) {
    match plan {
        RedirectPlan::Inherit => {}
        RedirectPlan::File(path) => {
            let (opened, message) = match stream {
                Stream::Stdin => (open_input(path), format!("cannot open file {} for input", path)),
                Stream::Stdout => (open_output(path), format!("cannot open {} for output", path)),
            };
            if opened.and_then(|file| install(file, stream)).is_err() {
                fail(message);
            }
        }
        RedirectPlan::Null => {
            let direction = match stream {
                Stream::Stdin => "input",
                Stream::Stdout => "output",
            };
            if open_null(stream).and_then(|file| install(file, stream)).is_err() {
                fail(format!("cannot open {} for {}", NULL_DEVICE, direction));
            }
        }
    }
}

/// Rewire stdin/stdout for the about-to-exec child.
///
/// Must only run in a forked child: on any failure it reports and ends the
/// process with status 1. Input is handled before output, so a bad input
/// path never creates the output file.
pub fn apply(cmd: &CommandRecord) {
    let (stdin, stdout) = plans(cmd);
    apply_stream(stdin, Stream::Stdin);
    apply_stream(stdout, Stream::Stdout);
}
