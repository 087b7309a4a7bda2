//! Session tests against an in-process POP3 server.
//!
//! The server runs on one half of a `tokio::io::duplex` pipe and records
//! every line the client sends.

#![allow(clippy::unwrap_used, clippy::too_many_lines)]

use std::collections::HashMap;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

use mailledger_pop3::auth::{apop_digest, xoauth2_response};
use mailledger_pop3::{
    AuthMethod, Credentials, Error, MailHandle, MailboxStat, Session, SessionState,
};

const USER: &str = "user";
const PASS: &str = "pass";
const STAMP: &str = "<12345.1699999999@localhost>";

/// Scripted POP3 server.
struct MockServer {
    greeting: Vec<u8>,
    apop_stamp: Option<String>,
    oauth2: bool,
    messages: Vec<Vec<&'static str>>,
}

impl MockServer {
    fn new() -> Self {
        Self {
            greeting: b"+OK ready\r\n".to_vec(),
            apop_stamp: None,
            oauth2: false,
            messages: vec![
                vec!["[ruby-core:85210]", "[Bug #14416]"],
                vec!["Subject: dots", "", ".leading dot", "..two dots", "."],
            ],
        }
    }

    fn apop(mut self, stamp: &[u8]) -> Self {
        let mut greeting = b"+OK ready ".to_vec();
        greeting.extend_from_slice(stamp);
        greeting.extend_from_slice(b"\r\n");
        self.greeting = greeting;
        self.apop_stamp = Some(String::from_utf8_lossy(stamp).into_owned());
        self
    }

    const fn oauth2(mut self) -> Self {
        self.oauth2 = true;
        self
    }

    /// Starts the server and returns the client half of the pipe.
    fn spawn(self) -> (DuplexStream, JoinHandle<Vec<String>>) {
        let (client, server) = tokio::io::duplex(16 * 1024);
        let handle = tokio::spawn(self.run(server));
        (client, handle)
    }

    async fn run(self, stream: DuplexStream) -> Vec<String> {
        let users: HashMap<&str, &str> = HashMap::from([(USER, PASS)]);
        let mut stream = BufReader::new(stream);
        let mut received = Vec::new();
        let mut user: Option<String> = None;
        let mut oauth2_started = false;

        stream.get_mut().write_all(&self.greeting).await.unwrap();

        loop {
            let mut line = String::new();
            if stream.read_line(&mut line).await.unwrap_or(0) == 0 {
                break;
            }
            let line = line.trim_end_matches("\r\n").to_string();
            received.push(line.clone());

            let reply = if oauth2_started {
                oauth2_started = false;
                if line == xoauth2_response("mail@mail.com", "randomtoken") {
                    "+OK\r\n".to_string()
                } else {
                    "-ERR Authentication failure: unknown user name or bad password.\r\n"
                        .to_string()
                }
            } else {
                let mut parts = line.splitn(2, ' ');
                let verb = parts.next().unwrap_or_default();
                let args = parts.next().unwrap_or_default();
                match verb {
                    "USER" => {
                        user = Some(args.to_string());
                        if users.contains_key(args) {
                            "+OK\r\n".to_string()
                        } else {
                            "-ERR unknown user\r\n".to_string()
                        }
                    }
                    "PASS" => {
                        let expected = user.as_deref().and_then(|u| users.get(u));
                        if expected == Some(&args) {
                            "+OK\r\n".to_string()
                        } else {
                            "-ERR invalid password\r\n".to_string()
                        }
                    }
                    "APOP" => {
                        let (name, digest) = args.split_once(' ').unwrap();
                        let ok = match (&self.apop_stamp, users.get(name)) {
                            (Some(stamp), Some(pass)) => apop_digest(stamp, pass) == digest,
                            _ => false,
                        };
                        if ok {
                            "+OK\r\n".to_string()
                        } else {
                            "-ERR authentication failed\r\n".to_string()
                        }
                    }
                    "AUTH" if args == "XOAUTH2" && self.oauth2 => {
                        oauth2_started = true;
                        "+ \r\n".to_string()
                    }
                    "AUTH" => "+ERR command not recognized\r\n".to_string(),
                    "STAT" => {
                        let size: usize = self.messages.iter().map(|m| wire_size(m)).sum();
                        format!("+OK {} {size}\r\n", self.messages.len())
                    }
                    "LIST" if !args.is_empty() => match self.message(args) {
                        Some(lines) => format!("+OK {args} {}\r\n", wire_size(lines)),
                        None => "-ERR no such message\r\n".to_string(),
                    },
                    "UIDL" if !args.is_empty() => match self.message(args) {
                        Some(_) => format!("+OK {args} uid-{args}\r\n"),
                        None => "-ERR no such message\r\n".to_string(),
                    },
                    "LIST" => {
                        let mut reply = "+OK scan listing follows\r\n".to_string();
                        for (i, m) in self.messages.iter().enumerate() {
                            reply.push_str(&format!("{} {}\r\n", i + 1, wire_size(m)));
                        }
                        reply.push_str(".\r\n");
                        reply
                    }
                    "UIDL" => {
                        let mut reply = "+OK\r\n".to_string();
                        for i in 0..self.messages.len() {
                            reply.push_str(&format!("{} uid-{}\r\n", i + 1, i + 1));
                        }
                        reply.push_str(".\r\n");
                        reply
                    }
                    "RETR" => match self.message(args) {
                        Some(lines) => multiline(lines, usize::MAX),
                        None => "-ERR no such message\r\n".to_string(),
                    },
                    "TOP" => {
                        let (n, k) = args.split_once(' ').unwrap();
                        match self.message(n) {
                            Some(lines) => multiline(lines, k.parse().unwrap()),
                            None => "-ERR no such message\r\n".to_string(),
                        }
                    }
                    "DELE" | "NOOP" | "RSET" => "+OK\r\n".to_string(),
                    "QUIT" => {
                        stream.get_mut().write_all(b"+OK bye\r\n").await.unwrap();
                        break;
                    }
                    _ => "-ERR command not recognized\r\n".to_string(),
                }
            };

            stream.get_mut().write_all(reply.as_bytes()).await.unwrap();
        }

        received
    }

    fn message(&self, number: &str) -> Option<&Vec<&'static str>> {
        let n: usize = number.parse().ok()?;
        self.messages.get(n.checked_sub(1)?)
    }
}

fn wire_size(lines: &[&str]) -> usize {
    lines.iter().map(|l| l.len() + 2).sum()
}

/// Sends `lines` dot-stuffed; `limit` caps body lines after the blank line.
fn multiline(lines: &[&str], limit: usize) -> String {
    let mut reply = "+OK\r\n".to_string();
    let has_headers = lines.contains(&"");
    let mut in_body = !has_headers;
    let mut sent = 0;
    for line in lines {
        if in_body {
            if sent == limit {
                break;
            }
            sent += 1;
        } else if line.is_empty() {
            in_body = true;
        }
        if line.starts_with('.') {
            reply.push('.');
        }
        reply.push_str(line);
        reply.push_str("\r\n");
    }
    reply.push_str(".\r\n");
    reply
}

/// Routes client logs to the test harness; `RUST_LOG=debug` shows the dialogue.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn started(server: MockServer) -> (Session<DuplexStream>, JoinHandle<Vec<String>>) {
    init_tracing();
    let (client, handle) = server.spawn();
    let mut session = Session::from_stream(client, AuthMethod::Plain);
    session.start(&Credentials::new(USER, PASS)).await.unwrap();
    (session, handle)
}

#[tokio::test]
async fn test_pop_auth_ok() {
    init_tracing();
    let (client, server) = MockServer::new().spawn();
    let mut session = Session::from_stream(client, AuthMethod::Plain);
    assert!(!session.uses_apop());
    assert!(!session.uses_oauth2());

    session.start(&Credentials::new(USER, PASS)).await.unwrap();
    assert_eq!(session.state(), SessionState::Transaction);
    assert_eq!(session.greeting().unwrap().text, "ready");

    session.finish().await;
    assert_eq!(server.await.unwrap(), vec!["USER user", "PASS pass", "QUIT"]);
}

#[tokio::test]
async fn test_pop_auth_ng() {
    let (client, server) = MockServer::new().spawn();
    let mut session = Session::from_stream(client, AuthMethod::Plain);

    let err = session
        .start(&Credentials::new(USER, "bad password"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(ref msg) if msg == "invalid password"));
    assert_eq!(session.state(), SessionState::Unstarted);

    session.finish().await;
    session.finish().await;
    // No QUIT after a failed login.
    assert_eq!(server.await.unwrap(), vec!["USER user", "PASS bad password"]);
}

#[tokio::test]
async fn test_pop_auth_retry_after_failure() {
    let (client, server) = MockServer::new().spawn();
    let mut session = Session::from_stream(client, AuthMethod::Plain);

    assert!(session.start(&Credentials::new(USER, "wrong")).await.is_err());
    session.start(&Credentials::new(USER, PASS)).await.unwrap();
    assert_eq!(session.state(), SessionState::Transaction);

    session.finish().await;
    assert_eq!(
        server.await.unwrap(),
        vec!["USER user", "PASS wrong", "USER user", "PASS pass", "QUIT"]
    );
}

#[tokio::test]
async fn test_apop_ok() {
    let (client, server) = MockServer::new().apop(STAMP.as_bytes()).spawn();
    let mut session = Session::from_stream(client, AuthMethod::Apop);
    assert!(session.uses_apop());

    session.start(&Credentials::new(USER, PASS)).await.unwrap();
    assert_eq!(session.state(), SessionState::Transaction);
    assert_eq!(session.apop_challenge().unwrap().as_str(), STAMP);

    session.finish().await;
    let received = server.await.unwrap();
    assert_eq!(received[0], format!("APOP user {}", apop_digest(STAMP, PASS)));
}

#[tokio::test]
async fn test_apop_stamp_after_other_brackets() {
    let mut server = MockServer::new().apop(STAMP.as_bytes());
    server.greeting = format!("+OK <pop.example.com> POP3 ready {STAMP}\r\n").into_bytes();
    let (client, _server) = server.spawn();
    let mut session = Session::from_stream(client, AuthMethod::Apop);

    session.start(&Credentials::new(USER, PASS)).await.unwrap();
    assert_eq!(session.apop_challenge().unwrap().as_str(), STAMP);
    session.finish().await;
}

#[tokio::test]
async fn test_apop_ng() {
    let (client, _server) = MockServer::new().apop(STAMP.as_bytes()).spawn();
    let mut session = Session::from_stream(client, AuthMethod::Apop);

    let err = session
        .start(&Credentials::new(USER, "bad password"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(ref msg) if msg == "authentication failed"));
    assert_ne!(session.state(), SessionState::Transaction);
    session.finish().await;
}

#[tokio::test]
async fn test_apop_invalid_non_ascii() {
    let (client, server) = MockServer::new()
        .apop(b"<\x8012345.1699999999@localhost>")
        .spawn();
    let mut session = Session::from_stream(client, AuthMethod::Apop);
    assert!(session.uses_apop());

    let err = session.start(&Credentials::new(USER, PASS)).await.unwrap_err();
    assert!(err.is_auth());
    assert_ne!(session.state(), SessionState::Transaction);

    session.finish().await;
    assert!(server.await.unwrap().is_empty());
}

#[tokio::test]
async fn test_apop_invalid_at() {
    let (client, _server) = MockServer::new()
        .apop(b"<12345.1699999999.localhost>")
        .spawn();
    let mut session = Session::from_stream(client, AuthMethod::Apop);

    let err = session.start(&Credentials::new(USER, PASS)).await.unwrap_err();
    assert!(err.is_auth());
    session.finish().await;
}

#[tokio::test]
async fn test_apop_without_stamp() {
    let (client, _server) = MockServer::new().spawn();
    let mut session = Session::from_stream(client, AuthMethod::Apop);

    let err = session.start(&Credentials::new(USER, PASS)).await.unwrap_err();
    assert!(matches!(err, Error::Auth(ref msg) if msg.contains("APOP")));
    session.finish().await;
}

#[tokio::test]
async fn test_apop_challenge_override() {
    // The greeting carries no stamp; the configured challenge is used instead.
    let server = MockServer {
        greeting: b"+OK ready\r\n".to_vec(),
        ..MockServer::new().apop(STAMP.as_bytes())
    };
    let (client, server) = server.spawn();
    let mut session = Session::from_stream(client, AuthMethod::Apop).with_apop_challenge(STAMP);

    session.start(&Credentials::new(USER, PASS)).await.unwrap();
    session.finish().await;
    assert_eq!(server.await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_oauth2() {
    let (client, server) = MockServer::new().oauth2().spawn();
    let mut session = Session::from_stream(client, AuthMethod::OAuth2);
    assert!(session.uses_oauth2());

    session
        .start(&Credentials::new("mail@mail.com", "randomtoken"))
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::Transaction);

    session.finish().await;
    assert_eq!(
        server.await.unwrap(),
        vec![
            "AUTH XOAUTH2",
            "dXNlcj1tYWlsQG1haWwuY29tAWF1dGg9QmVhcmVyIHJhbmRvbXRva2VuAQE=",
            "QUIT",
        ]
    );
}

#[tokio::test]
async fn test_oauth2_invalid() {
    let (client, _server) = MockServer::new().oauth2().spawn();
    let mut session = Session::from_stream(client, AuthMethod::OAuth2);

    let err = session
        .start(&Credentials::new("mail@mail.com", "wrongtoken"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(ref msg) if msg.starts_with("Authentication failure")));
    assert_eq!(session.state(), SessionState::Unstarted);
    session.finish().await;
}

#[tokio::test]
async fn test_oauth2_unsupported() {
    // The server answers `+ERR`, which must not be taken as a continuation.
    let (client, server) = MockServer::new().spawn();
    let mut session = Session::from_stream(client, AuthMethod::OAuth2);

    let err = session
        .start(&Credentials::new("mail@mail.com", "randomtoken"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(ref msg) if msg == "command not recognized"));
    assert_eq!(session.state(), SessionState::Unstarted);

    session.finish().await;
    assert_eq!(server.await.unwrap(), vec!["AUTH XOAUTH2"]);
}

#[tokio::test]
async fn test_retrieve_round_trip() {
    let (mut session, _server) = started(MockServer::new()).await;

    let body = session.retrieve(&MailHandle::new(1, 0)).await.unwrap();
    assert_eq!(body, b"[ruby-core:85210]\r\n[Bug #14416]\r\n");

    session.finish().await;
}

#[tokio::test]
async fn test_retrieve_unstuffs_dots() {
    let (mut session, _server) = started(MockServer::new()).await;

    let mail = MailHandle::new(2, 0);
    let body = mail.retrieve(&mut session).await.unwrap();
    assert_eq!(
        body,
        b"Subject: dots\r\n\r\n.leading dot\r\n..two dots\r\n.\r\n"
    );

    session.finish().await;
}

#[tokio::test]
async fn test_retrieve_top() {
    let (mut session, _server) = started(MockServer::new()).await;

    let top = session.retrieve_top(&MailHandle::new(1, 0), 1).await.unwrap();
    assert_eq!(top, b"[ruby-core:85210]\r\n");

    let top = session.retrieve_top(&MailHandle::new(2, 0), 1).await.unwrap();
    assert_eq!(top, b"Subject: dots\r\n\r\n.leading dot\r\n");

    session.finish().await;
}

#[tokio::test]
async fn test_retrieve_top_trims_over_delivery() {
    let (client, server) = tokio::io::duplex(1024);
    let script = tokio::spawn(async move {
        let mut server = BufReader::new(server);
        server.get_mut().write_all(b"+OK ready\r\n").await.unwrap();
        let replies = [
            "+OK\r\n",
            "+OK\r\n",
            "+OK\r\n[ruby-core:85210]\r\n[Bug #14416]\r\n.\r\n",
            "+OK 1 33\r\n",
        ];
        for reply in replies {
            let mut line = String::new();
            server.read_line(&mut line).await.unwrap();
            server.get_mut().write_all(reply.as_bytes()).await.unwrap();
        }
    });

    let mut session = Session::from_stream(client, AuthMethod::Plain);
    session.start(&Credentials::new(USER, PASS)).await.unwrap();

    let top = session.retrieve_top(&MailHandle::new(1, 0), 1).await.unwrap();
    assert_eq!(top, b"[ruby-core:85210]\r\n");
    // The surplus line was drained; the next reply lines up.
    assert_eq!(session.list_one(1).await.unwrap(), MailHandle::new(1, 33));

    script.await.unwrap();
    session.finish().await;
}

#[tokio::test]
async fn test_retrieve_error_keeps_session() {
    let (mut session, _server) = started(MockServer::new()).await;

    let err = session.retrieve(&MailHandle::new(9, 0)).await.unwrap_err();
    assert!(matches!(err, Error::Retrieval(ref msg) if msg == "no such message"));
    assert_eq!(session.state(), SessionState::Transaction);

    // Still usable.
    assert!(session.retrieve(&MailHandle::new(1, 0)).await.is_ok());
    session.finish().await;
}

#[tokio::test]
async fn test_listing() {
    let (mut session, _server) = started(MockServer::new()).await;

    let stat = session.stat().await.unwrap();
    assert_eq!(stat, MailboxStat { count: 2, size: 79 });

    let mails = session.list().await.unwrap();
    assert_eq!(mails, vec![MailHandle::new(1, 33), MailHandle::new(2, 46)]);
    assert_eq!(session.list_one(2).await.unwrap(), MailHandle::new(2, 46));

    let err = session.list_one(7).await.unwrap_err();
    assert!(matches!(err, Error::Retrieval(_)));
    assert_eq!(session.state(), SessionState::Transaction);

    let uids = session.uidl().await.unwrap();
    assert_eq!(uids.len(), 2);
    assert_eq!(uids[1].uid, "uid-2");
    assert_eq!(session.uidl_one(1).await.unwrap().uid, "uid-1");

    session.delete(&mails[0]).await.unwrap();
    session.reset().await.unwrap();
    session.noop().await.unwrap();
    session.finish().await;
}

#[tokio::test]
async fn test_retrieve_before_start() {
    let (client, _server) = MockServer::new().spawn();
    let mut session = Session::from_stream(client, AuthMethod::Plain);

    let err = session.retrieve(&MailHandle::new(1, 0)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    session.finish().await;
}

#[tokio::test]
async fn test_retrieve_after_finish() {
    let (mut session, _server) = started(MockServer::new()).await;
    session.finish().await;
    session.finish().await;

    let err = session.retrieve(&MailHandle::new(1, 0)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    let err = session.retrieve_top(&MailHandle::new(1, 0), 1).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}

#[tokio::test]
async fn test_start_twice() {
    let (mut session, _server) = started(MockServer::new()).await;
    let err = session.start(&Credentials::new(USER, PASS)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    session.finish().await;
}

#[tokio::test]
async fn test_rejected_greeting() {
    let (client, mut server) = tokio::io::duplex(1024);
    server.write_all(b"-ERR maildrop locked\r\n").await.unwrap();

    let mut session = Session::from_stream(client, AuthMethod::Plain);
    let err = session.start(&Credentials::new(USER, PASS)).await.unwrap_err();
    assert!(matches!(err, Error::Rejected(ref msg) if msg == "maildrop locked"));
    assert_eq!(session.state(), SessionState::Finished);
    session.finish().await;
}

#[tokio::test]
async fn test_malformed_greeting() {
    let (client, mut server) = tokio::io::duplex(1024);
    server.write_all(b"* OK IMAP4rev1 ready\r\n").await.unwrap();

    let mut session = Session::from_stream(client, AuthMethod::Plain);
    let err = session.start(&Credentials::new(USER, PASS)).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert_eq!(session.state(), SessionState::Finished);
    session.finish().await;
}

#[tokio::test]
async fn test_connection_lost_mid_body() {
    let (client, server) = tokio::io::duplex(1024);
    let script = tokio::spawn(async move {
        let mut server = BufReader::new(server);
        server.get_mut().write_all(b"+OK ready\r\n").await.unwrap();
        for reply in ["+OK\r\n", "+OK\r\n", "+OK\r\npartial line\r\n"] {
            let mut line = String::new();
            server.read_line(&mut line).await.unwrap();
            server.get_mut().write_all(reply.as_bytes()).await.unwrap();
        }
        // Dropping the server closes the pipe before the terminator.
    });

    let mut session = Session::from_stream(client, AuthMethod::Plain);
    session.start(&Credentials::new(USER, PASS)).await.unwrap();

    let err = session.retrieve(&MailHandle::new(1, 0)).await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(session.state(), SessionState::Finished);
    session.finish().await;
    script.await.unwrap();
}
