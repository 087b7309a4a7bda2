//! Connection configuration types.

use std::time::Duration;

use crate::types::AuthMethod;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 110). **Not recommended for production.**
    None,
    /// TLS from the start (port 995). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 110,
            Self::Implicit => 995,
        }
    }
}

/// POP3 session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Authentication scheme.
    pub auth: AuthMethod,
    /// APOP challenge to use instead of the one in the greeting.
    pub apop_challenge: Option<String>,
    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with implicit TLS on port 995 and
    /// `USER`/`PASS` authentication.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::builder(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for session configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    auth: AuthMethod,
    apop_challenge: Option<String>,
    connect_timeout: Duration,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            auth: AuthMethod::Plain,
            apop_challenge: None,
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the authentication scheme.
    #[must_use]
    pub const fn auth(mut self, auth: AuthMethod) -> Self {
        self.auth = auth;
        self
    }

    /// Overrides the APOP challenge normally taken from the greeting.
    #[must_use]
    pub fn apop_challenge(mut self, challenge: impl Into<String>) -> Self {
        self.apop_challenge = Some(challenge.into());
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            auth: self.auth,
            apop_challenge: self.apop_challenge,
            connect_timeout: self.connect_timeout,
        }
    }
}
