use std::io;

use thiserror::Error;

use crate::command::ParseError;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("fork: {0}")]
    Fork(nix::Error),
    #[error("too many background jobs (at most {0})")]
    TooManyJobs(usize),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ShellError {
    /// Only a failed fork ends the shell; everything else is reported and
    /// the loop carries on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShellError::Fork(_))
    }
}
