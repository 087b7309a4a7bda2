//! Authentication method selection.

use std::fmt;

/// Authentication scheme used by a session.
///
/// Exactly one scheme is chosen when the session is built; there is no
/// fallback from one scheme to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMethod {
    /// `USER` / `PASS` in plaintext.
    #[default]
    Plain,
    /// `APOP` challenge-response using the greeting timestamp (RFC 1939 §7).
    Apop,
    /// `AUTH XOAUTH2` SASL exchange with a bearer token.
    OAuth2,
}

impl AuthMethod {
    /// Returns the command verb that starts the exchange.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "USER",
            Self::Apop => "APOP",
            Self::OAuth2 => "XOAUTH2",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The bracketed timestamp a server advertises in its greeting for APOP.
///
/// Only obtainable from a greeting carrying a well-formed stamp
/// (`<` printable ASCII containing `@` `>`) or from an explicit, non-empty
/// override, so an APOP exchange can never run without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApopChallenge(String);

impl ApopChallenge {
    /// Wraps an explicit challenge, used verbatim.
    ///
    /// Returns `None` for an empty string.
    #[must_use]
    pub fn new(challenge: impl Into<String>) -> Option<Self> {
        let challenge = challenge.into();
        if challenge.is_empty() {
            None
        } else {
            Some(Self(challenge))
        }
    }

    /// Extracts the stamp from a raw greeting line.
    ///
    /// Every `<` is tried in turn and the first well-formed stamp wins, so
    /// other bracketed text in the greeting is skipped. Returns `None` if no
    /// stamp consists of printable ASCII around an `@`.
    #[must_use]
    pub fn from_greeting(greeting: &[u8]) -> Option<Self> {
        greeting
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b == b'<')
            .find_map(|(start, _)| Self::stamp_at(&greeting[start..]))
    }

    /// Validates the stamp that starts at the beginning of `rest`.
    fn stamp_at(rest: &[u8]) -> Option<Self> {
        let end = rest.iter().position(|&b| b == b'>')?;
        let stamp = &rest[..=end];
        let inner = &stamp[1..end];

        let printable = inner
            .iter()
            .all(|&b| (b'!'..=b'~').contains(&b) && b != b'<');
        let at = inner.iter().position(|&b| b == b'@')?;
        if !printable || at == 0 || at == inner.len() - 1 {
            return None;
        }

        // Printable ASCII is valid UTF-8.
        std::str::from_utf8(stamp).ok().map(|s| Self(s.to_string()))
    }

    /// Returns the challenge including its angle brackets.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApopChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
