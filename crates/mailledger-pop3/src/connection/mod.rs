//! POP3 connection management: transport, framing and session state.

mod config;
mod framed;
mod mail;
mod session;
mod stream;

pub use config::{Config, ConfigBuilder, Security};
pub use framed::FramedStream;
pub use mail::{MailHandle, MessageSource};
pub use session::{Greeting, Session, SessionState};
pub use stream::{Pop3Stream, connect, connect_plain, connect_tls};
