//! # Reply
//!
//! Server replies and the control channel framing, as described by RFC 959 section 4.2.
//!
//! A reply is made of one line `CCC text`, or of several lines; in that case the first line
//! is `CCC-text` and the reply ends with the first line starting with the same code followed by a space.

use std::fmt;
use std::io::{self, BufRead, Cursor};

use crate::types::{FtpError, FtpResult, ProtocolViolation};

const CRLF: &str = "\r\n";

/// A single server response, possibly spanning several lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    status_code: u16,
    status_line: String,
}

impl Reply {
    /// Parse a complete reply from text.
    ///
    /// Lines may be terminated either by `\r\n` or `\n`; the text after the reply terminator is ignored.
    pub fn parse(text: &str) -> FtpResult<Self> {
        read_reply(&mut Cursor::new(text.as_bytes()))
    }

    /// Reply code, between 100 and 599
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Full reply text. Every line is kept and terminated by `\r\n`
    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    /// Returns whether the server accepted the command (code < 400)
    pub fn is_positive(&self) -> bool {
        self.status_code < 400
    }

    /// Returns whether the server refused the command (code >= 400)
    pub fn is_negative(&self) -> bool {
        !self.is_positive()
    }

    /// Get the data port announced by an EPSV reply
    pub fn epsv_port(&self) -> FtpResult<u16> {
        parse_epsv_port(&self.status_line)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_line.trim_end_matches(['\r', '\n']))
    }
}

/// Read exactly one reply from `reader`
pub(crate) fn read_reply<R: BufRead>(reader: &mut R) -> FtpResult<Reply> {
    let first = read_line(reader)?;
    let status_code = match (reply_code(&first), first.as_bytes().get(3)) {
        (Some(code), Some(b' ' | b'-')) => code,
        _ => return Err(FtpError::protocol(ProtocolViolation::InvalidReply, first)),
    };
    let mut status_line = first + CRLF;

    if status_line.as_bytes()[3] == b'-' {
        loop {
            let line = read_line(reader)?;
            let last = is_last_line(&line, status_code);
            status_line.push_str(&line);
            status_line.push_str(CRLF);
            if last {
                break;
            }
        }
    }

    Ok(Reply {
        status_code,
        status_line,
    })
}

/// Parse the port out of an EPSV reply text, which contains `(|||port|)`.
///
/// The port is found between the third byte after the first `|` and the last `|` of the text.
pub fn parse_epsv_port(text: &str) -> FtpResult<u16> {
    let bytes = text.as_bytes();
    let bad_port = || {
        FtpError::protocol(
            ProtocolViolation::InvalidEpsvPort,
            text.trim_end_matches(['\r', '\n']),
        )
    };

    let begin = bytes.iter().position(|b| *b == b'|').ok_or_else(bad_port)? + 3;
    if begin >= bytes.len() {
        return Err(bad_port());
    }
    let end = bytes.iter().rposition(|b| *b == b'|').ok_or_else(bad_port)?;
    if end <= begin {
        return Err(bad_port());
    }

    std::str::from_utf8(&bytes[begin..end])
        .ok()
        .and_then(|port| port.parse::<u16>().ok())
        .ok_or_else(bad_port)
}

/// Read bytes until `\n`; carriage returns are stripped.
/// EOF before the end of the line means the server went away.
fn read_line<R: BufRead>(reader: &mut R) -> FtpResult<String> {
    let mut buf = Vec::new();
    let len = reader
        .read_until(b'\n', &mut buf)
        .map_err(|e| FtpError::connection("cannot receive reply", e))?;
    if len == 0 || buf.last() != Some(&b'\n') {
        return Err(FtpError::connection(
            "cannot receive reply",
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            ),
        ));
    }
    buf.retain(|b| *b != b'\r' && *b != b'\n');
    let line = String::from_utf8_lossy(&buf).into_owned();
    trace!("CC IN: {:?}", line);

    Ok(line)
}

/// Get the code at the beginning of the line, if it's made of three digits in the reply range
fn reply_code(line: &str) -> Option<u16> {
    let digits = line.as_bytes().get(..3)?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let code = digits
        .iter()
        .fold(0u16, |code, digit| code * 10 + u16::from(digit - b'0'));
    (100..=599).contains(&code).then_some(code)
}

/// Returns whether `line` terminates the multi-line reply opened with `code`
fn is_last_line(line: &str, code: u16) -> bool {
    line.as_bytes().get(3) == Some(&b' ') && reply_code(line) == Some(code)
}
