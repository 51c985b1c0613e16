use std::ffi::CString;

use thiserror::Error;

/// Longest line the shell accepts, in bytes.
pub const MAX_LINE_LEN: usize = 2048;
/// Most tokens a single line may carry.
pub const MAX_ARGS: usize = 512;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected filename after '{0}'")]
    MissingRedirectTarget(&'static str),
    #[error("line is longer than {MAX_LINE_LEN} characters")]
    LineTooLong,
    #[error("too many arguments (at most {MAX_ARGS})")]
    TooManyArguments,
    #[error("argument contains a NUL byte: {0:?}")]
    InteriorNul(String),
}

/// One parsed input line. Built fresh for every line the shell reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRecord {
    pub program: String,
    /// Program name first; never contains `<`, `>`, their targets or a trailing `&`.
    pub arguments: Vec<String>,
    pub input_redirect: Option<String>,
    pub output_redirect: Option<String>,
    pub run_in_background: bool,
}

impl CommandRecord {
    /// Tokenize an already `$$`-expanded line.
    ///
    /// `foreground_only` is sampled once, here: a trailing `&` is always
    /// stripped but only marks the record as background while the mode is off.
    pub fn parse(line: &str, foreground_only: bool) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.len() > MAX_LINE_LEN {
            return Err(ParseError::LineTooLong);
        }

        let mut tokens: Vec<&str> = line.split(' ').filter(|t| !t.is_empty()).collect();
        if tokens.len() > MAX_ARGS {
            return Err(ParseError::TooManyArguments);
        }

        let ampersand = tokens.last() == Some(&"&");
        if ampersand {
            tokens.pop();
        }

        let mut record = CommandRecord {
            run_in_background: ampersand && !foreground_only,
            ..Default::default()
        };

        let mut i = 0;
        while i < tokens.len() {
            match tokens[i] {
                "<" => {
                    let target = tokens.get(i + 1).ok_or(ParseError::MissingRedirectTarget("<"))?;
                    record.input_redirect = Some(target.to_string());
                    i += 2;
                }
                ">" => {
                    let target = tokens.get(i + 1).ok_or(ParseError::MissingRedirectTarget(">"))?;
                    record.output_redirect = Some(target.to_string());
                    i += 2;
                }
                token => {
                    record.arguments.push(token.to_string());
                    i += 1;
                }
            }
        }

        record.program = record.arguments.first().cloned().unwrap_or_default();
        Ok(record)
    }

    /// Blank lines and lines whose first word starts with `#` do nothing.
    pub fn is_comment_or_blank(&self) -> bool {
        self.arguments.is_empty() || self.program.starts_with('#')
    }

    /// The argument vector for `execvp`, built before forking.
    pub fn to_argv(&self) -> Result<Vec<CString>, ParseError> {
        self.arguments
            .iter()
            .map(|arg| CString::new(arg.as_str()).map_err(|_| ParseError::InteriorNul(arg.clone())))
            .collect()
    }
}
