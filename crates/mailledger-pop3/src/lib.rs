//! # mailledger-pop3
//!
//! A POP3 client library implementing RFC 1939.
//!
//! ## Features
//!
//! - **Session state machine**: retrieval is only possible after a
//!   successful login, and the transport is released exactly once
//! - **Authentication**: `USER`/`PASS`, `APOP` and `AUTH XOAUTH2`
//! - **Byte-exact retrieval**: `RETR` and `TOP` bodies keep their CRLF line
//!   endings and are dot-unstuffed
//! - **TLS support**: implicit TLS (POP3S, port 995)
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailledger_pop3::{AuthMethod, Config, Credentials, Session};
//!
//! #[tokio::main]
//! async fn main() -> mailledger_pop3::Result<()> {
//!     let config = Config::builder("pop.example.com")
//!         .auth(AuthMethod::Apop)
//!         .build();
//!
//!     let mut session = Session::connect(config).await?;
//!     session.start(&Credentials::new("user", "password")).await?;
//!
//!     for mail in session.list().await? {
//!         let message = mail.retrieve(&mut session).await?;
//!         println!("message {}: {} octets", mail.number(), message.len());
//!     }
//!
//!     session.finish().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! ┌────────────┐  start()  ┌─────────────┐         ┌─────────────┐ finish() ┌──────────┐
//! │ Unstarted  │ ────────→ │ Authorizing │ ──────→ │ Transaction │ ───────→ │ Finished │
//! └────────────┘           └─────────────┘         └─────────────┘          └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`auth`]: Authentication exchanges and digests
//! - [`command`]: POP3 command builders
//! - [`connection`]: Transport, framing, session and message handles
//! - [`parser`]: Status line and listing parser
//! - [`types`]: Core POP3 types

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{
    Config, ConfigBuilder, MailHandle, MessageSource, Pop3Stream, Security, Session,
    SessionState,
};
pub use error::{Error, Result};
pub use types::{ApopChallenge, AuthMethod, Credentials, MailboxStat, UniqueId};
