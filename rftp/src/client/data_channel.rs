//! # Data Channel
//!
//! This module exposes the data connection where listings and files are read from or written to

use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream};

use super::control_channel;
use crate::types::{ClientOptions, FtpError, FtpResult};

/// Size of the buffer used to stream files
pub const TRANSFER_BUFFER_SIZE: usize = 8192;

/// Connection opened for a single listing or file transfer
#[derive(Debug)]
pub struct DataChannel {
    remote: SocketAddr,
    stream: Option<TcpStream>,
    buffer: Box<[u8; TRANSFER_BUFFER_SIZE]>,
}

impl DataChannel {
    /// Connect to the data port announced by the server.
    ///
    /// If the connection fails no socket is kept around.
    pub fn open(ip: IpAddr, port: u16, options: &ClientOptions) -> FtpResult<Self> {
        let remote = SocketAddr::new(ip, port);
        debug!("Opening data connection to {remote}");
        let stream = control_channel::connect(remote, options)
            .map_err(|e| FtpError::connection("cannot open data connection", e))?;
        trace!("Data connection established with {remote}");

        Ok(Self {
            remote,
            stream: Some(stream),
            buffer: Box::new([0; TRANSFER_BUFFER_SIZE]),
        })
    }

    /// Address of the server data port
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Shut the connection down. The server sends the transfer result only once it sees the connection closed.
    pub fn close(&mut self) -> FtpResult<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        trace!("Closing data connection to {}", self.remote);
        match stream.shutdown(Shutdown::Both) {
            Err(err) if err.kind() != ErrorKind::NotConnected => {
                Err(FtpError::connection("cannot close data connection", err))
            }
            _ => Ok(()),
        }
    }

    /// Read text until the server closes the connection
    pub fn recv(&mut self) -> FtpResult<String> {
        let stream = self.stream_mut()?;
        let mut data = Vec::new();
        stream
            .read_to_end(&mut data)
            .map_err(|e| FtpError::connection("cannot receive data", e))?;
        trace!("Received {} bytes of text", data.len());

        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Write all of `source` to the server. Returns the amount of bytes sent
    pub fn send_file<R: Read + ?Sized>(&mut self, source: &mut R) -> FtpResult<u64> {
        let stream = self.stream.as_mut().ok_or_else(not_open)?;
        let buffer = self.buffer.as_mut_slice();
        let mut total: u64 = 0;
        loop {
            let len = match source.read(buffer) {
                Ok(0) => break,
                Ok(len) => len,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FtpError::connection("cannot read file", err)),
            };
            stream
                .write_all(&buffer[..len])
                .map_err(|e| FtpError::connection("cannot send file", e))?;
            total += len as u64;
        }
        stream
            .flush()
            .map_err(|e| FtpError::connection("cannot send file", e))?;
        trace!("Sent {total} bytes");

        Ok(total)
    }

    /// Write everything the server sends to `sink`, until the server closes the connection.
    /// Returns the amount of bytes received
    pub fn recv_file<W: Write + ?Sized>(&mut self, sink: &mut W) -> FtpResult<u64> {
        let stream = self.stream.as_mut().ok_or_else(not_open)?;
        let buffer = self.buffer.as_mut_slice();
        let mut total: u64 = 0;
        loop {
            let len = match stream.read(buffer) {
                Ok(0) => break,
                Ok(len) => len,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FtpError::connection("cannot receive file", err)),
            };
            sink.write_all(&buffer[..len])
                .map_err(|e| FtpError::connection("cannot write file", e))?;
            total += len as u64;
        }
        sink.flush()
            .map_err(|e| FtpError::connection("cannot write file", e))?;
        trace!("Received {total} bytes");

        Ok(total)
    }

    fn stream_mut(&mut self) -> FtpResult<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(not_open)
    }
}

fn not_open() -> FtpError {
    FtpError::connection("data connection is closed", ErrorKind::NotConnected.into())
}
