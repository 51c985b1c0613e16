use std::env;
use std::io::{self, BufRead, Write};

use colored::Colorize;
use tracing::{debug, warn};

use crate::builtins::{Builtin, Outcome};
use crate::command::CommandRecord;
use crate::config::Config;
use crate::jobs::JobTable;
use crate::process::{self, ExitStatus};
use crate::prompt::Prompt;
use crate::signal_handler::{self, ForegroundMode};
use crate::variables::expand_pid;

/// Per-shell state threaded through the built-ins and the supervisor.
#[derive(Debug)]
pub struct Session {
    /// How the last foreground command ended; read by `status`.
    pub last_status: ExitStatus,
    pub jobs: JobTable,
    pub mode: ForegroundMode,
    /// Substituted for `$$`.
    pub pid: u32,
}

impl Session {
    pub fn new(jobs: JobTable, mode: ForegroundMode) -> Self {
        Session {
            last_status: ExitStatus::default(),
            jobs,
            mode,
            pid: std::process::id(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Leave the loop and exit the process with this code.
    Exit(i32),
}

pub struct Shell {
    prompt: Prompt,
    session: Session,
}

impl Shell {
    pub fn new(config: &Config) -> Self {
        if let Ok(exe_path) = env::current_exe() {
            env::set_var("SHELL", exe_path.to_string_lossy().to_string());
        }

        Self {
            prompt: Prompt::new(),
            session: Session::new(JobTable::new(config.max_jobs), ForegroundMode::process()),
        }
    }

    /// Read and run lines until `exit`, end of input, or a failed fork.
    /// Returns the process exit code.
    pub fn run(&mut self) -> nix::Result<i32> {
        signal_handler::install()?;

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut line = String::new();

        loop {
            if let Err(e) = self.prompt.display(&mut stdout) {
                warn!(error = %e, "failed to write prompt");
            }

            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => {
                    debug!("end of input");
                    self.session.jobs.kill_all();
                    return Ok(0);
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("smallsh: error reading input: {}", e);
                    self.session.jobs.kill_all();
                    return Ok(0);
                }
            }

            if let Flow::Exit(code) = self.handle_line(&line, &mut stdout) {
                return Ok(code);
            }

            if let Err(e) = process::reap_background(&mut self.session, &mut stdout) {
                warn!(error = %e, "failed to report finished background jobs");
            }
        }
    }

    /// Run one input line: expand `$$`, parse, then either a built-in or an
    /// external command.
    pub fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> Flow {
        let expanded = expand_pid(line, self.session.pid);
        let cmd = match CommandRecord::parse(&expanded, self.session.mode.is_active()) {
            Ok(cmd) => cmd,
            Err(e) => {
                eprintln!("smallsh: {}", e);
                return Flow::Continue;
            }
        };

        if let Some(builtin) = Builtin::parse(&cmd) {
            return match builtin.execute(&mut self.session, out) {
                Ok(Outcome::Continue) => Flow::Continue,
                Ok(Outcome::Exit) => Flow::Exit(0),
                Err(e) => {
                    warn!(error = %e, "built-in failed to write output");
                    Flow::Continue
                }
            };
        }

        match process::run_external(&cmd, &mut self.session, out) {
            Ok(()) => Flow::Continue,
            Err(e) if e.is_fatal() => {
                eprintln!("{}", format!("smallsh: {}", e).red().bold());
                self.session.jobs.kill_all();
                Flow::Exit(1)
            }
            Err(e) => {
                eprintln!("smallsh: {}", e);
                Flow::Continue
            }
        }
    }
}
