//! Authentication exchanges.
//!
//! Implements:
//! - `USER`/`PASS` (RFC 1939 §7) - plaintext login
//! - `APOP` (RFC 1939 §7) - MD5 digest over the greeting timestamp
//! - XOAUTH2 (Google/Microsoft proprietary) - `OAuth2` bearer token over SASL
//!
//! Each exchange runs once and reports the server's verdict. There is no
//! fallback between schemes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use md5::{Digest, Md5};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::command::Command;
use crate::connection::FramedStream;
use crate::error::{Error, Result};
use crate::types::{ApopChallenge, Credentials, Status};

/// SASL mechanism name for `OAuth2` bearer tokens.
const XOAUTH2: &str = "XOAUTH2";

/// Computes the APOP digest: lowercase hex of `MD5(challenge ++ secret)`.
///
/// `challenge` is the greeting stamp including its angle brackets.
///
/// # Example
///
/// ```
/// use mailledger_pop3::auth::apop_digest;
///
/// let digest = apop_digest("<1896.697170952@dbc.mtview.ca.us>", "tanstaaf");
/// assert_eq!(digest, "c4c9334bac560ecc979e58001b3e22fb");
/// ```
#[must_use]
pub fn apop_digest(challenge: &str, secret: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(challenge.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates the XOAUTH2 client response.
///
/// Format: `user=<user>\x01auth=Bearer <token>\x01\x01` (base64 encoded)
#[must_use]
pub fn xoauth2_response(user: &str, token: &str) -> String {
    let auth_string = format!("user={user}\x01auth=Bearer {token}\x01\x01");
    STANDARD.encode(auth_string.as_bytes())
}

/// An authentication scheme ready to run.
///
/// Unlike [`crate::AuthMethod`], the APOP variant carries the challenge it
/// digests, so an APOP exchange without a challenge cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// `USER` then `PASS`.
    Plain,
    /// `APOP` with the greeting challenge.
    Apop(ApopChallenge),
    /// `AUTH XOAUTH2`.
    OAuth2,
}

impl Strategy {
    /// Runs the exchange on `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] carrying the server's text if the server
    /// rejects the credentials or the mechanism, and transport or protocol
    /// errors as they occur.
    pub async fn authenticate<S>(
        &self,
        stream: &mut FramedStream<S>,
        credentials: &Credentials,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self {
            Self::Plain => authenticate_plain(stream, credentials).await,
            Self::Apop(challenge) => authenticate_apop(stream, credentials, challenge).await,
            Self::OAuth2 => authenticate_oauth2(stream, credentials).await,
        }
    }
}

async fn authenticate_plain<S>(stream: &mut FramedStream<S>, credentials: &Credentials) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let user = Command::User {
        name: credentials.identifier().to_string(),
    };
    stream.command(&user).await?.into_ok(Error::Auth)?;

    let pass = Command::Pass {
        password: credentials.secret().to_string(),
    };
    stream.command(&pass).await?.into_ok(Error::Auth)?;

    Ok(())
}

async fn authenticate_apop<S>(
    stream: &mut FramedStream<S>,
    credentials: &Credentials,
    challenge: &ApopChallenge,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let cmd = Command::Apop {
        name: credentials.identifier().to_string(),
        digest: apop_digest(challenge.as_str(), credentials.secret()),
    };
    stream.command(&cmd).await?.into_ok(Error::Auth)?;
    Ok(())
}

async fn authenticate_oauth2<S>(
    stream: &mut FramedStream<S>,
    credentials: &Credentials,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let start = Command::Auth {
        mechanism: XOAUTH2.to_string(),
    };
    let reply = stream.command(&start).await?;
    if !reply.is_continue() {
        // -ERR here means the server does not offer XOAUTH2.
        return Err(Error::Auth(reply.text));
    }

    let response = Command::SaslResponse(xoauth2_response(
        credentials.identifier(),
        credentials.secret(),
    ));
    let reply = stream.command(&response).await?;

    match reply.status {
        Status::Ok => Ok(()),
        Status::Err => Err(Error::Auth(reply.text)),
        Status::Continue => {
            // The server sent a base64 JSON error and waits for an empty
            // response before the final -ERR.
            let details = STANDARD
                .decode(reply.text.as_bytes())
                .map(|raw| String::from_utf8_lossy(&raw).into_owned())
                .unwrap_or(reply.text);
            tracing::debug!(%details, "XOAUTH2 rejected");

            let last = stream
                .command(&Command::SaslResponse(String::new()))
                .await?;
            if last.is_ok() {
                return Err(Error::Protocol(
                    "XOAUTH2 succeeded after an error challenge".to_string(),
                ));
            }
            Err(Error::Auth(if last.text.is_empty() {
                details
            } else {
                last.text
            }))
        }
    }
}
