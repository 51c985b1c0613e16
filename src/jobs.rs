use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::process::ExitStatus;

pub const DEFAULT_MAX_JOBS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    pub pid: Pid,
    /// Cleared once a reaping sweep has collected the process.
    pub live: bool,
}

/// Background children launched by this shell, oldest first.
///
/// Entries are only appended; reaping marks them dead instead of removing
/// them. Dead entries are dropped only when the table would otherwise be full.
#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<Job>,
    capacity: usize,
    reaped_early: Vec<(Pid, ExitStatus)>,
}

impl JobTable {
    pub fn new(capacity: usize) -> Self {
        JobTable {
            jobs: Vec::new(),
            capacity: capacity.max(1),
            reaped_early: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether another background job may be launched. Compacts dead
    /// entries if the table is full.
    pub fn has_room(&mut self) -> bool {
        if self.jobs.len() >= self.capacity {
            self.jobs.retain(|job| job.live);
        }
        self.jobs.len() < self.capacity
    }

    pub fn add(&mut self, pid: Pid) {
        debug!(%pid, "tracking background job");
        self.jobs.push(Job { pid, live: true });
    }

    /// Returns false for pids this table never launched.
    pub fn mark_reaped(&mut self, pid: Pid) -> bool {
        match self.jobs.iter_mut().rev().find(|job| job.pid == pid && job.live) {
            Some(job) => {
                job.live = false;
                true
            }
            None => false,
        }
    }

    /// Record a child that was already collected by the check right after
    /// its fork, so the next sweep still reports it.
    pub fn remember_early(&mut self, pid: Pid, status: ExitStatus) {
        self.reaped_early.push((pid, status));
    }

    pub fn take_early(&mut self) -> Vec<(Pid, ExitStatus)> {
        let early = std::mem::take(&mut self.reaped_early);
        for (pid, _) in &early {
            self.mark_reaped(*pid);
        }
        early
    }

    pub fn live_pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.jobs.iter().filter(|job| job.live).map(|job| job.pid)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Send SIGTERM to every job still believed to be running. Does not wait.
    pub fn kill_all(&self) {
        for pid in self.live_pids() {
            match signal::kill(pid, Signal::SIGTERM) {
                Ok(()) => debug!(%pid, "sent SIGTERM"),
                Err(Errno::ESRCH) => {}
                Err(e) => warn!(%pid, error = %e, "failed to signal background job"),
            }
        }
    }
}
