//! Mailbox listing types.

/// Result of `STAT`: number of messages and total size in octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MailboxStat {
    /// Number of messages in the maildrop.
    pub count: u32,
    /// Total size of the maildrop in octets.
    pub size: u64,
}

/// One `UIDL` entry: message number and its server-assigned unique id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueId {
    /// Message number.
    pub number: u32,
    /// Unique-id string (printable ASCII, 1-70 characters).
    pub uid: String,
}
