//! POP3 session state machine.
//!
//! A [`Session`] owns the transport and walks through the RFC 1939 states:
//!
//! ```text
//! Unstarted ── start() ──→ Authorizing ──→ Transaction ── finish() ──→ Finished
//!     ↑                        │
//!     └──── auth rejected ─────┘
//! ```
//!
//! Authentication failures leave the transport open so the caller can retry
//! or finish. Transport failures and protocol violations release the
//! transport at once and move the session to `Finished`.

use tokio::io::{AsyncRead, AsyncWrite};

use super::config::Config;
use super::framed::FramedStream;
use super::mail::{MailHandle, MessageSource};
use super::stream::{Pop3Stream, connect};
use crate::auth::Strategy;
use crate::command::Command;
use crate::parser::{parse_scan_listing, parse_stat, parse_uidl_listing};
use crate::types::{ApopChallenge, AuthMethod, Credentials, MailboxStat, UniqueId};
use crate::{Error, Result};

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Connected, greeting not yet processed.
    #[default]
    Unstarted,
    /// Authentication exchange in progress.
    Authorizing,
    /// Authenticated; retrieval commands are allowed.
    Transaction,
    /// Transport released.
    Finished,
}

/// Server greeting as received on connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// Text after `+OK`.
    pub text: String,
    /// APOP timestamp, if the server advertised a well-formed one.
    pub challenge: Option<ApopChallenge>,
}

/// A POP3 client session over a single transport.
pub struct Session<S = Pop3Stream> {
    stream: Option<FramedStream<S>>,
    state: SessionState,
    auth: AuthMethod,
    apop_override: Option<ApopChallenge>,
    greeting: Option<Greeting>,
}

impl Session<Pop3Stream> {
    /// Opens the transport described by `config`.
    ///
    /// The greeting is read by [`Session::start`], not here.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or TLS handshake fails or times out.
    pub async fn connect(config: Config) -> Result<Self> {
        let stream = connect(&config).await?;
        tracing::debug!(host = %config.host, port = config.port, auth = %config.auth, "connected");

        let mut session = Self::from_stream(stream, config.auth);
        if let Some(challenge) = config.apop_challenge {
            session = session.with_apop_challenge(challenge);
        }
        Ok(session)
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates an unstarted session over an already connected stream.
    pub fn from_stream(stream: S, auth: AuthMethod) -> Self {
        Self {
            stream: Some(FramedStream::new(stream)),
            state: SessionState::Unstarted,
            auth,
            apop_override: None,
            greeting: None,
        }
    }

    /// Uses `challenge` for APOP instead of the greeting's timestamp.
    ///
    /// An empty string is ignored.
    #[must_use]
    pub fn with_apop_challenge(mut self, challenge: impl Into<String>) -> Self {
        self.apop_override = ApopChallenge::new(challenge);
        self
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true if the session is configured for APOP.
    #[must_use]
    pub const fn uses_apop(&self) -> bool {
        matches!(self.auth, AuthMethod::Apop)
    }

    /// Returns true if the session is configured for XOAUTH2.
    #[must_use]
    pub const fn uses_oauth2(&self) -> bool {
        matches!(self.auth, AuthMethod::OAuth2)
    }

    /// Returns the server greeting once [`Session::start`] has read it.
    #[must_use]
    pub const fn greeting(&self) -> Option<&Greeting> {
        self.greeting.as_ref()
    }

    /// Returns the challenge APOP would use: the override, else the greeting's.
    #[must_use]
    pub fn apop_challenge(&self) -> Option<&ApopChallenge> {
        self.apop_override
            .as_ref()
            .or_else(|| self.greeting.as_ref()?.challenge.as_ref())
    }

    /// Reads the greeting (first call only) and authenticates.
    ///
    /// On success the session enters the transaction state. If the server
    /// rejects the credentials the session returns to `Unstarted` with the
    /// transport still open.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the session is not `Unstarted`
    /// - [`Error::Auth`] if the server rejects the credentials or scheme, or
    ///   APOP is configured but the greeting carries no usable timestamp
    /// - [`Error::Rejected`] if the greeting is `-ERR`
    /// - transport and protocol errors, after which the session is finished
    pub async fn start(&mut self, credentials: &Credentials) -> Result<()> {
        match self.state {
            SessionState::Unstarted => {}
            SessionState::Authorizing => {
                return Err(Error::InvalidState(
                    "POP session authentication was interrupted".to_string(),
                ));
            }
            SessionState::Transaction => {
                return Err(Error::InvalidState("POP session already started".to_string()));
            }
            SessionState::Finished => {
                return Err(Error::InvalidState("POP session already finished".to_string()));
            }
        }

        self.state = SessionState::Authorizing;
        match self.authorize(credentials).await {
            Ok(()) => {
                tracing::info!(auth = %self.auth, user = credentials.identifier(), "authenticated");
                self.state = SessionState::Transaction;
                Ok(())
            }
            Err(e) if e.is_fatal() || self.greeting.is_none() => {
                self.abort(&e);
                Err(e)
            }
            Err(e) => {
                tracing::warn!(auth = %self.auth, error = %e, "authentication failed");
                self.state = SessionState::Unstarted;
                Err(e)
            }
        }
    }

    async fn authorize(&mut self, credentials: &Credentials) -> Result<()> {
        if self.greeting.is_none() {
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| Error::InvalidState("transport released".to_string()))?;
            let text = stream.read_status().await?.into_ok(Error::Rejected)?;
            let challenge = ApopChallenge::from_greeting(text.as_bytes());
            self.greeting = Some(Greeting { text, challenge });
        }

        let strategy = self.strategy()?;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::InvalidState("transport released".to_string()))?;
        strategy.authenticate(stream, credentials).await
    }

    fn strategy(&self) -> Result<Strategy> {
        match self.auth {
            AuthMethod::Plain => Ok(Strategy::Plain),
            AuthMethod::OAuth2 => Ok(Strategy::OAuth2),
            AuthMethod::Apop => self
                .apop_challenge()
                .cloned()
                .map(Strategy::Apop)
                .ok_or_else(|| {
                    Error::Auth("not an APOP server: greeting has no valid timestamp".to_string())
                }),
        }
    }

    /// Ends the session and releases the transport.
    ///
    /// Sends `QUIT` if the session reached the transaction state, which
    /// makes the server commit messages marked with [`Session::delete`].
    /// Never fails; problems are logged. Calling it again is a no-op.
    pub async fn finish(&mut self) {
        if self.state == SessionState::Finished {
            return;
        }

        if let Some(mut stream) = self.stream.take() {
            if self.state == SessionState::Transaction {
                match stream.command(&Command::Quit).await {
                    Ok(reply) if reply.is_ok() => tracing::debug!(text = %reply.text, "QUIT"),
                    Ok(reply) => tracing::warn!(text = %reply.text, "server rejected QUIT"),
                    Err(e) => tracing::warn!(error = %e, "QUIT failed"),
                }
            }
            if let Err(e) = stream.shutdown().await {
                tracing::debug!(error = %e, "shutdown failed");
            }
        }

        self.state = SessionState::Finished;
    }

    /// Retrieves a whole message (`RETR`).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside the transaction state,
    /// [`Error::Retrieval`] if the server rejects the command.
    pub async fn retrieve(&mut self, handle: &MailHandle) -> Result<Vec<u8>> {
        handle.retrieve(self).await
    }

    /// Retrieves the headers and first `lines` body lines (`TOP`).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside the transaction state,
    /// [`Error::Retrieval`] if the server rejects the command.
    pub async fn retrieve_top(&mut self, handle: &MailHandle, lines: u32) -> Result<Vec<u8>> {
        handle.retrieve_top(self, lines).await
    }

    /// Returns the message count and maildrop size (`STAT`).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside the transaction state,
    /// [`Error::Retrieval`] if the server rejects the command.
    pub async fn stat(&mut self) -> Result<MailboxStat> {
        let stream = self.transaction_stream()?;
        let result: Result<MailboxStat> = async {
            let text = stream.command(&Command::Stat).await?.into_ok(Error::Retrieval)?;
            parse_stat(&text)
        }
        .await;
        self.settle(result)
    }

    /// Lists every message not marked deleted (`LIST`).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside the transaction state,
    /// [`Error::Retrieval`] if the server rejects the command.
    pub async fn list(&mut self) -> Result<Vec<MailHandle>> {
        let stream = self.transaction_stream()?;
        let result: Result<Vec<MailHandle>> = async {
            stream.command(&Command::List(None)).await?.into_ok(Error::Retrieval)?;
            stream
                .read_listing()
                .await?
                .iter()
                .map(|line| parse_scan_listing(line).map(|(n, size)| MailHandle::new(n, size)))
                .collect()
        }
        .await;
        self.settle(result)
    }

    /// Returns the handle for one message (`LIST n`).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside the transaction state,
    /// [`Error::Retrieval`] if there is no such message.
    pub async fn list_one(&mut self, number: u32) -> Result<MailHandle> {
        let stream = self.transaction_stream()?;
        let result: Result<MailHandle> = async {
            let text = stream
                .command(&Command::List(Some(number)))
                .await?
                .into_ok(Error::Retrieval)?;
            let (n, size) = parse_scan_listing(text.as_bytes())?;
            Ok(MailHandle::new(n, size))
        }
        .await;
        self.settle(result)
    }

    /// Returns the unique ids of every message (`UIDL`).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside the transaction state,
    /// [`Error::Retrieval`] if the server rejects the command.
    pub async fn uidl(&mut self) -> Result<Vec<UniqueId>> {
        let stream = self.transaction_stream()?;
        let result: Result<Vec<UniqueId>> = async {
            stream.command(&Command::Uidl(None)).await?.into_ok(Error::Retrieval)?;
            stream
                .read_listing()
                .await?
                .iter()
                .map(|line| parse_uidl_listing(line.as_slice()))
                .collect()
        }
        .await;
        self.settle(result)
    }

    /// Returns the unique id of one message (`UIDL n`).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside the transaction state,
    /// [`Error::Retrieval`] if there is no such message.
    pub async fn uidl_one(&mut self, number: u32) -> Result<UniqueId> {
        let stream = self.transaction_stream()?;
        let result: Result<UniqueId> = async {
            let text = stream
                .command(&Command::Uidl(Some(number)))
                .await?
                .into_ok(Error::Retrieval)?;
            parse_uidl_listing(text.as_bytes())
        }
        .await;
        self.settle(result)
    }

    /// Marks a message deleted (`DELE`); it is removed on [`Session::finish`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside the transaction state,
    /// [`Error::Rejected`] if the server refuses.
    pub async fn delete(&mut self, handle: &MailHandle) -> Result<()> {
        self.simple(&Command::Dele(handle.number())).await
    }

    /// Unmarks all messages marked deleted (`RSET`).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside the transaction state,
    /// [`Error::Rejected`] if the server refuses.
    pub async fn reset(&mut self) -> Result<()> {
        self.simple(&Command::Rset).await
    }

    /// Keeps the connection alive (`NOOP`).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside the transaction state,
    /// [`Error::Rejected`] if the server refuses.
    pub async fn noop(&mut self) -> Result<()> {
        self.simple(&Command::Noop).await
    }

    async fn simple(&mut self, command: &Command) -> Result<()> {
        let stream = self.transaction_stream()?;
        let result: Result<()> = async {
            stream.command(command).await?.into_ok(Error::Rejected)?;
            Ok(())
        }
        .await;
        self.settle(result)
    }

    async fn fetch(&mut self, command: Command, top_lines: Option<u32>) -> Result<Vec<u8>> {
        let stream = self.transaction_stream()?;
        let result: Result<Vec<u8>> = async {
            stream.command(&command).await?.into_ok(Error::Retrieval)?;
            stream.read_body(top_lines).await
        }
        .await;
        self.settle(result)
    }

    fn transaction_stream(&mut self) -> Result<&mut FramedStream<S>> {
        match self.state {
            SessionState::Transaction => self
                .stream
                .as_mut()
                .ok_or_else(|| Error::InvalidState("transport released".to_string())),
            SessionState::Unstarted | SessionState::Authorizing => Err(Error::InvalidState(
                "POP session not yet started".to_string(),
            )),
            SessionState::Finished => Err(Error::InvalidState(
                "POP session already finished".to_string(),
            )),
        }
    }

    /// Releases the transport if `result` is a fatal error.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal() {
                self.abort(e);
            }
        }
        result
    }

    fn abort(&mut self, error: &Error) {
        tracing::warn!(%error, "closing POP session");
        self.stream = None;
        self.state = SessionState::Finished;
    }
}

impl<S> MessageSource for Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn retr(&mut self, number: u32) -> Result<Vec<u8>> {
        self.fetch(Command::Retr(number), None).await
    }

    async fn top(&mut self, number: u32, lines: u32) -> Result<Vec<u8>> {
        self.fetch(Command::Top { number, lines }, Some(lines)).await
    }
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("auth", &self.auth)
            .field("greeting", &self.greeting)
            .finish_non_exhaustive()
    }
}
