//! POP3 command builder.

use std::fmt;

/// POP3 command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// USER - Name the mailbox
    User {
        /// Mailbox name
        name: String,
    },
    /// PASS - Password for the named mailbox
    Pass {
        /// Password
        password: String,
    },
    /// APOP - Challenge-response login
    Apop {
        /// Mailbox name
        name: String,
        /// Lowercase hex MD5 digest
        digest: String,
    },
    /// AUTH - Begin a SASL exchange
    Auth {
        /// SASL mechanism name
        mechanism: String,
    },
    /// Bare SASL client response line
    SaslResponse(String),
    /// STAT - Maildrop size
    Stat,
    /// LIST - Scan listing for all or one message
    List(Option<u32>),
    /// UIDL - Unique-id listing for all or one message
    Uidl(Option<u32>),
    /// RETR - Retrieve a message
    Retr(u32),
    /// TOP - Retrieve headers and the first lines of the body
    Top {
        /// Message number
        number: u32,
        /// Number of body lines
        lines: u32,
    },
    /// DELE - Mark a message deleted
    Dele(u32),
    /// RSET - Unmark deleted messages
    Rset,
    /// NOOP - No operation
    Noop,
    /// QUIT - Close the session
    Quit,
}

impl Command {
    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::User { name } => {
                buf.extend_from_slice(b"USER ");
                buf.extend_from_slice(name.as_bytes());
            }
            Self::Pass { password } => {
                buf.extend_from_slice(b"PASS ");
                buf.extend_from_slice(password.as_bytes());
            }
            Self::Apop { name, digest } => {
                buf.extend_from_slice(b"APOP ");
                buf.extend_from_slice(name.as_bytes());
                buf.push(b' ');
                buf.extend_from_slice(digest.as_bytes());
            }
            Self::Auth { mechanism } => {
                buf.extend_from_slice(b"AUTH ");
                buf.extend_from_slice(mechanism.as_bytes());
            }
            Self::SaslResponse(response) => {
                buf.extend_from_slice(response.as_bytes());
            }
            Self::Stat => {
                buf.extend_from_slice(b"STAT");
            }
            Self::List(number) => {
                buf.extend_from_slice(b"LIST");
                if let Some(n) = number {
                    buf.extend_from_slice(format!(" {n}").as_bytes());
                }
            }
            Self::Uidl(number) => {
                buf.extend_from_slice(b"UIDL");
                if let Some(n) = number {
                    buf.extend_from_slice(format!(" {n}").as_bytes());
                }
            }
            Self::Retr(number) => {
                buf.extend_from_slice(format!("RETR {number}").as_bytes());
            }
            Self::Top { number, lines } => {
                buf.extend_from_slice(format!("TOP {number} {lines}").as_bytes());
            }
            Self::Dele(number) => {
                buf.extend_from_slice(format!("DELE {number}").as_bytes());
            }
            Self::Rset => {
                buf.extend_from_slice(b"RSET");
            }
            Self::Noop => {
                buf.extend_from_slice(b"NOOP");
            }
            Self::Quit => {
                buf.extend_from_slice(b"QUIT");
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

// Secrets never reach logs through Debug.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { name } => write!(f, "USER {name}"),
            Self::Pass { .. } => f.write_str("PASS <redacted>"),
            Self::Apop { name, .. } => write!(f, "APOP {name} <redacted>"),
            Self::Auth { mechanism } => write!(f, "AUTH {mechanism}"),
            Self::SaslResponse(_) => f.write_str("<redacted SASL response>"),
            Self::Stat => f.write_str("STAT"),
            Self::List(None) => f.write_str("LIST"),
            Self::List(Some(n)) => write!(f, "LIST {n}"),
            Self::Uidl(None) => f.write_str("UIDL"),
            Self::Uidl(Some(n)) => write!(f, "UIDL {n}"),
            Self::Retr(n) => write!(f, "RETR {n}"),
            Self::Top { number, lines } => write!(f, "TOP {number} {lines}"),
            Self::Dele(n) => write!(f, "DELE {n}"),
            Self::Rset => f.write_str("RSET"),
            Self::Noop => f.write_str("NOOP"),
            Self::Quit => f.write_str("QUIT"),
        }
    }
}
