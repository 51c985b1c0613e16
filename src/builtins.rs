use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::command::CommandRecord;
use crate::process::ExitStatus;
use crate::shell::Session;

/// Commands the shell runs itself, without forking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Builtin {
    /// Blank line or `#` comment.
    Nothing,
    Status,
    Exit,
    Cd(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Exit,
}

impl Builtin {
    /// Exact match on the first word; `None` means "run it as a program".
    pub fn parse(cmd: &CommandRecord) -> Option<Self> {
        if cmd.is_comment_or_blank() {
            return Some(Builtin::Nothing);
        }

        match cmd.program.as_str() {
            "status" => Some(Builtin::Status),
            "exit" => Some(Builtin::Exit),
            // with several operands the last one is used
            "cd" => Some(Builtin::Cd(cmd.arguments.iter().skip(1).last().cloned())),
            _ => None,
        }
    }

    pub fn execute<W: Write>(&self, session: &mut Session, out: &mut W) -> io::Result<Outcome> {
        match self {
            Builtin::Nothing => {}

            Builtin::Status => {
                match session.last_status {
                    ExitStatus::Exited(code) => writeln!(out, "exit value {} ", code)?,
                    ExitStatus::Signaled(sig) => writeln!(out, "terminated by signal {}", sig)?,
                }
                out.flush()?;
            }

            Builtin::Exit => {
                debug!(
                    tracked = session.jobs.len(),
                    live = session.jobs.live_pids().count(),
                    "exiting"
                );
                session.jobs.kill_all();
                return Ok(Outcome::Exit);
            }

            Builtin::Cd(path) => {
                if let Some(target) = cd_target(path.as_deref()) {
                    if let Err(e) = env::set_current_dir(&target) {
                        eprintln!("cd: {}: {}", target.display(), e);
                    }
                }
                match env::current_dir() {
                    Ok(cwd) => writeln!(out, "{}", cwd.display())?,
                    Err(e) => warn!(error = %e, "cannot read working directory"),
                }
                out.flush()?;
            }
        }
        Ok(Outcome::Continue)
    }
}

/// `cd` with no operand goes home; otherwise the operand is resolved
/// against the working directory, and an absolute operand stays absolute.
fn cd_target(path: Option<&str>) -> Option<PathBuf> {
    match path {
        None => match env::var_os("HOME") {
            Some(home) => Some(PathBuf::from(home)),
            None => {
                eprintln!("cd: HOME not set");
                None
            }
        },
        Some(dir) => match env::current_dir() {
            Ok(cwd) => Some(cwd.join(dir)),
            Err(_) => Some(PathBuf::from(dir)),
        },
    }
}
