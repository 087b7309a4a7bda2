//! POP3 status line types.

use crate::error::{Error, Result};

/// Status indicator of a single-line response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `+OK` - command succeeded.
    Ok,
    /// `-ERR` - command failed.
    Err,
    /// `+` - SASL continuation request.
    Continue,
}

/// A parsed status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// Status indicator.
    pub status: Status,
    /// Text following the indicator, without the separating space or CRLF.
    pub text: String,
}

impl StatusLine {
    /// Creates a new status line.
    #[must_use]
    pub fn new(status: Status, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }

    /// Returns true for `+OK`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Returns true for `-ERR`.
    #[must_use]
    pub fn is_err(&self) -> bool {
        self.status == Status::Err
    }

    /// Returns true for a `+` continuation.
    #[must_use]
    pub fn is_continue(&self) -> bool {
        self.status == Status::Continue
    }

    /// Converts the line into its text if it is `+OK`.
    ///
    /// A `-ERR` line is mapped through `on_err` with the server's message;
    /// a continuation where none was requested is a protocol violation.
    ///
    /// # Errors
    ///
    /// Returns `on_err(text)` for `-ERR` and [`Error::Protocol`] for `+`.
    pub fn into_ok(self, on_err: fn(String) -> Error) -> Result<String> {
        match self.status {
            Status::Ok => Ok(self.text),
            Status::Err => Err(on_err(self.text)),
            Status::Continue => Err(Error::Protocol(format!(
                "unexpected continuation: {}",
                self.text
            ))),
        }
    }
}
