//! POP3 response parser.

use crate::error::{Error, Result};
use crate::types::{MailboxStat, Status, StatusLine, UniqueId};

/// Parses a single status line.
///
/// POP3 status lines take one of three shapes:
/// - Success: `+OK 2 messages\r\n`
/// - Failure: `-ERR no such message\r\n`
/// - Failure from a few servers: `+ERR command not recognized\r\n`
/// - SASL continuation: `+ <base64 challenge>\r\n`
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the line has none of these shapes.
pub fn parse_status_line(line: &[u8]) -> Result<StatusLine> {
    let line = strip_line_ending(line);

    if let Some(rest) = indicator(line, b"+OK") {
        return Ok(StatusLine::new(Status::Ok, text(rest)));
    }
    // Some servers answer an unsupported AUTH with `+ERR`.
    if let Some(rest) = indicator(line, b"-ERR").or_else(|| indicator(line, b"+ERR")) {
        return Ok(StatusLine::new(Status::Err, text(rest)));
    }
    if let Some(rest) = line.strip_prefix(b"+") {
        return Ok(StatusLine::new(Status::Continue, text(rest)));
    }

    Err(Error::Protocol(format!(
        "Malformed status line: {}",
        String::from_utf8_lossy(line)
    )))
}

/// Matches `+OK` or `-ERR` followed by end of line or a space.
fn indicator<'a>(line: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    let rest = line.strip_prefix(prefix)?;
    match rest.first() {
        None | Some(b' ') => Some(rest),
        Some(_) => None,
    }
}

fn text(rest: &[u8]) -> String {
    let rest = rest.strip_prefix(b" ").unwrap_or(rest);
    String::from_utf8_lossy(rest).into_owned()
}

/// Removes a trailing CRLF (or bare LF).
#[must_use]
pub fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Checks if a line is the `.` that terminates a multiline response.
#[must_use]
pub fn is_terminator(line: &[u8]) -> bool {
    strip_line_ending(line) == b"."
}

/// Reverses dot-stuffing on one body line.
///
/// A line that starts with `..` loses its first dot; every other line,
/// including its line ending, is returned unchanged.
#[must_use]
pub fn unstuff(line: &[u8]) -> &[u8] {
    if line.starts_with(b"..") {
        &line[1..]
    } else {
        line
    }
}

/// Parses the text of a `+OK` reply to `STAT`: `<count> <size>`.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the text is not two numbers.
pub fn parse_stat(text: &str) -> Result<MailboxStat> {
    let mut parts = text.split_whitespace();
    let count = parse_number(parts.next(), text)?;
    let size = parse_number(parts.next(), text)?;
    Ok(MailboxStat { count, size })
}

/// Parses a scan listing (`LIST`) line: `<number> <size>`.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the line is not two numbers.
pub fn parse_scan_listing(line: &[u8]) -> Result<(u32, u64)> {
    let line = String::from_utf8_lossy(strip_line_ending(line));
    let mut parts = line.split_whitespace();
    let number = parse_number(parts.next(), &line)?;
    let size = parse_number(parts.next(), &line)?;
    Ok((number, size))
}

/// Parses a unique-id listing (`UIDL`) line: `<number> <uid>`.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the number or the id is missing.
pub fn parse_uidl_listing(line: &[u8]) -> Result<UniqueId> {
    let line = String::from_utf8_lossy(strip_line_ending(line));
    let mut parts = line.split_whitespace();
    let number = parse_number(parts.next(), &line)?;
    let uid = parts
        .next()
        .ok_or_else(|| Error::Protocol(format!("Missing unique id: {line}")))?;
    Ok(UniqueId {
        number,
        uid: uid.to_string(),
    })
}

fn parse_number<T: std::str::FromStr>(part: Option<&str>, line: &str) -> Result<T> {
    part.and_then(|p| p.parse().ok())
        .ok_or_else(|| Error::Protocol(format!("Malformed listing: {line}")))
}
