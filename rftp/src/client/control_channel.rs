//! # Control Channel
//!
//! The long-lived connection to the command port of the server

use std::io::{BufReader, ErrorKind, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use crate::reply::{self, Reply};
use crate::types::{ClientOptions, FtpError, FtpResult};

/// Connection to the server command port. Commands are written to it and replies are read from it.
#[derive(Debug, Default)]
pub struct ControlChannel {
    reader: Option<BufReader<TcpStream>>,
}

impl ControlChannel {
    /// Resolve `hostname` and connect to the first address which accepts the connection.
    ///
    /// The server greeting is not read here.
    pub fn open(&mut self, hostname: &str, port: u16, options: &ClientOptions) -> FtpResult<()> {
        self.close();
        debug!("Connecting to {hostname}:{port}");
        let addrs: Vec<SocketAddr> = (hostname, port)
            .to_socket_addrs()
            .map_err(|e| FtpError::connection("cannot resolve host", e))?
            .collect();
        let stream = connect_any(&addrs, options)?;
        debug!("Established connection with server");
        self.reader = Some(BufReader::new(stream));

        Ok(())
    }

    /// Returns whether the channel holds a socket which is still connected to its peer.
    ///
    /// A peer which hung up is detected by peeking the socket without blocking; no data is consumed.
    pub fn is_open(&self) -> FtpResult<bool> {
        let Some(reader) = self.reader.as_ref() else {
            return Ok(false);
        };
        if !reader.buffer().is_empty() {
            return Ok(true);
        }
        let stream = reader.get_ref();
        stream
            .set_nonblocking(true)
            .map_err(|e| FtpError::connection("cannot probe connection", e))?;
        let mut byte = [0u8; 1];
        let peeked = stream.peek(&mut byte);
        stream
            .set_nonblocking(false)
            .map_err(|e| FtpError::connection("cannot probe connection", e))?;
        match peeked {
            Ok(0) => {
                debug!("Server closed the control connection");
                Ok(false)
            }
            Ok(_) => Ok(true),
            Err(err) => match err.kind() {
                ErrorKind::WouldBlock | ErrorKind::Interrupted => Ok(true),
                ErrorKind::NotConnected
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted => Ok(false),
                _ => Err(FtpError::connection("cannot probe connection", err)),
            },
        }
    }

    /// Write `command` followed by CRLF
    pub fn send(&mut self, command: &str) -> FtpResult<()> {
        let stream = self.stream_mut()?;
        stream
            .write_all(format!("{command}\r\n").as_bytes())
            .and_then(|_| stream.flush())
            .map_err(|e| FtpError::connection("cannot send command", e))
    }

    /// Read one reply
    pub fn recv(&mut self) -> FtpResult<Reply> {
        let reader = self.reader.as_mut().ok_or_else(not_connected)?;
        reply::read_reply(reader)
    }

    /// IP address of the server; data connections are opened towards it
    pub fn peer_ip(&self) -> FtpResult<IpAddr> {
        let reader = self.reader.as_ref().ok_or_else(not_connected)?;
        reader
            .get_ref()
            .peer_addr()
            .map(|addr| addr.ip())
            .map_err(|e| FtpError::connection("cannot get server address", e))
    }

    /// Close the connection. Errors are ignored.
    pub fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            trace!("Closing control connection");
            let _ = reader.get_ref().shutdown(Shutdown::Both);
        }
    }

    /// Drop the connection after a failure. Same as [`ControlChannel::close`]
    pub fn reset(&mut self) {
        if self.reader.is_some() {
            debug!("Resetting control connection");
        }
        self.close();
    }

    fn stream_mut(&mut self) -> FtpResult<&mut TcpStream> {
        self.reader
            .as_mut()
            .map(BufReader::get_mut)
            .ok_or_else(not_connected)
    }
}

/// Connect to the first reachable address among `addrs`
pub(crate) fn connect_any(addrs: &[SocketAddr], options: &ClientOptions) -> FtpResult<TcpStream> {
    let mut last_err = std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "host resolved to no address",
    );
    for addr in addrs {
        trace!("Trying {addr}");
        match connect(*addr, options) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!("Cannot connect to {addr}: {err}");
                last_err = err;
            }
        }
    }

    Err(FtpError::connection("cannot open connection", last_err))
}

/// Connect to `addr`, then apply socket timeouts
pub(crate) fn connect(addr: SocketAddr, options: &ClientOptions) -> std::io::Result<TcpStream> {
    let stream = match options.connect_timeout {
        Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
        None => TcpStream::connect(addr)?,
    };
    stream.set_read_timeout(options.read_timeout)?;
    stream.set_write_timeout(options.write_timeout)?;

    Ok(stream)
}

fn not_connected() -> FtpError {
    FtpError::connection(
        "not connected",
        std::io::ErrorKind::NotConnected.into(),
    )
}
