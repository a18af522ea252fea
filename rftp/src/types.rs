//! # Types
//!
//! Results, errors and options shared by the whole engine

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::reply::Reply;

/// A shorthand for a Result whose error type is always an FtpError.
pub type FtpResult<T> = std::result::Result<T, FtpError>;

/// `FtpError` describes the failures which are NOT a plain refusal by the server.
///
/// A negative reply from the server is never an error: it's reported as [`CommandResult::NotOk`].
#[derive(Debug, Error)]
pub enum FtpError {
    /// Transport failure: resolve, connect, read, write or close.
    /// The session is reset when this error occurs.
    #[error("Connection error: {action}: {source}")]
    ConnectionError {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },
    /// The server sent something which doesn't respect the protocol.
    /// The session is reset when this error occurs.
    #[error("Protocol error: {reason}: {line:?}")]
    ProtocolError {
        reason: ProtocolViolation,
        line: String,
    },
    /// A local file couldn't be opened or created. The session is not affected.
    #[error("File error: {}: {source}", .path.display())]
    FileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The kind of protocol violation carried by [`FtpError::ProtocolError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// The reply line doesn't start with `CCC ` or `CCC-`
    InvalidReply,
    /// The EPSV reply doesn't carry a port in the form `(|||port|)`
    InvalidEpsvPort,
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidReply => write!(f, "invalid server reply"),
            Self::InvalidEpsvPort => write!(f, "cannot parse server port"),
        }
    }
}

impl FtpError {
    pub(crate) fn connection(action: &'static str, source: std::io::Error) -> Self {
        Self::ConnectionError { action, source }
    }

    pub(crate) fn protocol(reason: ProtocolViolation, line: impl ToString) -> Self {
        Self::ProtocolError {
            reason,
            line: line.to_string(),
        }
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileError {
            path: path.into(),
            source,
        }
    }

    /// Returns whether after this error the control connection can't be trusted anymore
    pub fn breaks_session(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError { .. } | Self::ProtocolError { .. }
        )
    }
}

/// Outcome of a command which reached the server.
///
/// `Ok` carries the payload of the operation, `NotOk` the negative reply the server answered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult<T = Reply> {
    Ok(T),
    NotOk(Reply),
}

impl<T> CommandResult<T> {
    /// Returns whether the server accepted the command
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Returns whether the server refused the command
    pub fn is_not_ok(&self) -> bool {
        !self.is_ok()
    }

    /// Get the payload, if the command was accepted
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::NotOk(_) => None,
        }
    }

    /// Maps the payload of an accepted command
    pub fn map<U, F>(self, f: F) -> CommandResult<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Ok(value) => CommandResult::Ok(f(value)),
            Self::NotOk(reply) => CommandResult::NotOk(reply),
        }
    }
}

impl From<Reply> for CommandResult<Reply> {
    fn from(reply: Reply) -> Self {
        if reply.is_negative() {
            Self::NotOk(reply)
        } else {
            Self::Ok(reply)
        }
    }
}

/// File Type used in `TYPE` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// ASCII text; no line ending conversion is performed by the client
    Ascii,
    /// Image (binary)
    Image,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascii => write!(f, "A"),
            Self::Image => write!(f, "I"),
        }
    }
}

/// Transport options applied to every socket opened by a [`crate::Client`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Maximum time to wait for a control or data connection to be established
    pub connect_timeout: Option<Duration>,
    /// Read timeout for control and data sockets
    pub read_timeout: Option<Duration>,
    /// Write timeout for control and data sockets
    pub write_timeout: Option<Duration>,
    /// Allow `download` to replace an existing local file
    pub overwrite: bool,
}

impl ClientOptions {
    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set both read and write timeout
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self.write_timeout = Some(timeout);
        self
    }

    /// Allow downloads to overwrite existing local files
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}
