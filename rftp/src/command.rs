//! # Command
//!
//! The set of FTP commands sent on the control channel

use std::fmt;

use crate::types::FileType;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Ftp commands with their arguments
pub enum Command {
    /// Change working directory
    Cwd(String),
    /// Remove file at specified path
    Dele(String),
    /// Extended passive mode <https://www.rfc-editor.org/rfc/rfc2428#section-3>
    Epsv,
    /// List entries at specified path. If path is not provided list entries at current working directory
    List(Option<String>),
    /// Make directory
    Mkd(String),
    /// Ping server
    Noop,
    /// Provide login password
    Pass(String),
    /// Print working directory
    Pwd,
    /// Quit
    Quit,
    /// Retrieve file
    Retr(String),
    /// Remove directory
    Rmd(String),
    /// Get file size of specified path
    Size(String),
    /// Server status, or status of the specified path
    Stat(Option<String>),
    /// Put file at specified path
    Store(String),
    /// Get the system type
    Syst,
    /// Set transfer type
    Type(FileType),
    /// Provide user to login as
    User(String),
}

impl Command {
    /// Command line as it should appear in logs; secrets are masked
    pub fn to_log_string(&self) -> String {
        match self {
            Self::Pass(_) => "PASS ********".to_string(),
            cmd => cmd.to_string(),
        }
    }
}

// -- stringify

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cwd(d) => write!(f, "CWD {d}"),
            Self::Dele(p) => write!(f, "DELE {p}"),
            Self::Epsv => write!(f, "EPSV"),
            Self::List(Some(p)) => write!(f, "LIST {p}"),
            Self::List(None) => write!(f, "LIST"),
            Self::Mkd(p) => write!(f, "MKD {p}"),
            Self::Noop => write!(f, "NOOP"),
            Self::Pass(p) => write!(f, "PASS {p}"),
            Self::Pwd => write!(f, "PWD"),
            Self::Quit => write!(f, "QUIT"),
            Self::Retr(p) => write!(f, "RETR {p}"),
            Self::Rmd(p) => write!(f, "RMD {p}"),
            Self::Size(p) => write!(f, "SIZE {p}"),
            Self::Stat(Some(p)) => write!(f, "STAT {p}"),
            Self::Stat(None) => write!(f, "STAT"),
            Self::Store(p) => write!(f, "STOR {p}"),
            Self::Syst => write!(f, "SYST"),
            Self::Type(t) => write!(f, "TYPE {t}"),
            Self::User(u) => write!(f, "USER {u}"),
        }
    }
}
