//! Per-message handles.

use crate::Result;

/// Anything that can answer `RETR` and `TOP` for a message number.
///
/// [`crate::Session`] is the real implementation; tests substitute stubs.
#[allow(async_fn_in_trait)]
pub trait MessageSource {
    /// Returns the full message (`RETR`), each line CRLF-terminated.
    async fn retr(&mut self, number: u32) -> Result<Vec<u8>>;

    /// Returns the headers and the first `lines` body lines (`TOP`).
    async fn top(&mut self, number: u32, lines: u32) -> Result<Vec<u8>>;
}

/// A message in the maildrop, identified by its sequence number.
///
/// Handles are plain data: they are produced by [`crate::Session::list`] or
/// built directly when the number is already known, and are only meaningful
/// while the session that produced them is in the transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MailHandle {
    number: u32,
    size: u64,
}

impl MailHandle {
    /// Creates a handle for message `number` (1-based) of `size` octets.
    #[must_use]
    pub const fn new(number: u32, size: u64) -> Self {
        Self { number, size }
    }

    /// Returns the message number.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }

    /// Returns the size the server declared, in octets.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Retrieves the whole message.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Retrieval`] if the server rejects the command.
    pub async fn retrieve<M: MessageSource>(&self, source: &mut M) -> Result<Vec<u8>> {
        source.retr(self.number).await
    }

    /// Retrieves the headers and the first `lines` lines of the body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Retrieval`] if the server rejects the command.
    pub async fn retrieve_top<M: MessageSource>(
        &self,
        source: &mut M,
        lines: u32,
    ) -> Result<Vec<u8>> {
        source.top(self.number, lines).await
    }
}
