//! Core POP3 types.

mod credentials;
mod method;
mod stat;
mod status;

pub use credentials::Credentials;
pub use method::{ApopChallenge, AuthMethod};
pub use stat::{MailboxStat, UniqueId};
pub use status::{Status, StatusLine};
