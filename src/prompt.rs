use std::io::{self, Write};

pub struct Prompt {
    prefix: &'static str,
}

impl Prompt {
    pub fn new() -> Self {
        Self {
            prefix: ": ",
        }
    }

    /// Flushed so it shows before the shell blocks on input.
    pub fn display<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(self.prefix.as_bytes())?;
        out.flush()
    }
}
