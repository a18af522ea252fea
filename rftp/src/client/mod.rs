//! # Client
//!
//! The client drives a session with the server: it sends the commands on the control channel,
//! opens a data channel for every listing or file transfer and reports every reply and error
//! to the subscribed observers.

mod control_channel;
mod data_channel;

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Arc, Weak};

pub use control_channel::ControlChannel;
pub use data_channel::{DataChannel, TRANSFER_BUFFER_SIZE};

use crate::command::Command;
use crate::observer::{EventObserver, Observers};
use crate::reply::Reply;
use crate::types::{ClientOptions, CommandResult, FileType, FtpError, FtpResult};

/// FTP client.
///
/// Every operation blocks until the server has sent its final reply. When an operation fails with
/// a connection or a protocol error, the control connection is dropped and the client must be opened again.
#[derive(Default)]
pub struct Client {
    control: ControlChannel,
    observers: Observers,
    options: ClientOptions,
}

impl Client {
    /// Create a client with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client which applies `options` to every connection it opens
    pub fn with_options(options: ClientOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Connect to the server and read its greeting.
    /// Any previous connection is dropped.
    pub fn open<S: AsRef<str>>(&mut self, hostname: S, port: u16) -> FtpResult<CommandResult> {
        debug!("Opening session with {}:{port}", hostname.as_ref());
        self.guarded(|client| {
            client
                .control
                .open(hostname.as_ref(), port, &client.options)?;
            debug!("Reading server greeting...");
            client.recv().map(CommandResult::from)
        })
    }

    /// Returns whether the control connection is established
    pub fn is_open(&mut self) -> bool {
        self.guarded(|client| client.control.is_open())
            .unwrap_or(false)
    }

    /// Log in with `user`. The password is sent only if the server asks for it with 331.
    pub fn login<S: AsRef<str>>(&mut self, user: S, password: S) -> FtpResult<CommandResult> {
        debug!("Signing in with user '{}'", user.as_ref());
        self.guarded(|client| {
            let reply = client.command(Command::User(user.as_ref().to_string()))?;
            if reply.status_code() != 331 {
                return Ok(reply.into());
            }
            debug!("Password is required");
            client
                .command(Command::Pass(password.as_ref().to_string()))
                .map(CommandResult::from)
        })
    }

    /// Change the working directory
    pub fn cd<S: AsRef<str>>(&mut self, path: S) -> FtpResult<CommandResult> {
        debug!("Changing working directory to {}", path.as_ref());
        self.simple_command(Command::Cwd(path.as_ref().to_string()))
    }

    /// List the content of `path`, or of the working directory.
    ///
    /// The listing is returned as sent by the server, and relayed to the observers when not empty.
    pub fn ls(&mut self, path: Option<&str>) -> FtpResult<CommandResult<String>> {
        debug!("Listing {}", path.unwrap_or("working directory"));
        self.guarded(|client| {
            client.transfer(Command::List(path.map(str::to_string)), |data, observers| {
                let listing = data.recv()?;
                if !listing.is_empty() {
                    observers.reply(&listing);
                }
                Ok(listing)
            })
        })
    }

    /// Store the local file at `local` as `remote`. Returns the amount of bytes sent.
    ///
    /// The local file is opened before anything is sent to the server.
    pub fn upload<P: AsRef<Path>, S: AsRef<str>>(
        &mut self,
        local: P,
        remote: S,
    ) -> FtpResult<CommandResult<u64>> {
        let local = local.as_ref();
        debug!("Uploading {} to {}", local.display(), remote.as_ref());
        self.guarded(|client| {
            let mut file = open_source(local)?;
            client.transfer(Command::Store(remote.as_ref().to_string()), |data, _| {
                data.send_file(&mut file)
            })
        })
    }

    /// Retrieve `remote` into the local file at `local`. Returns the amount of bytes received.
    ///
    /// An existing local file is replaced only if [`ClientOptions::overwrite`] is set; it is written over
    /// in place and truncated once the transfer succeeds, so a refused transfer leaves it untouched.
    /// A file created by this call is removed if the transfer doesn't complete.
    pub fn download<S: AsRef<str>, P: AsRef<Path>>(
        &mut self,
        remote: S,
        local: P,
    ) -> FtpResult<CommandResult<u64>> {
        let local = local.as_ref();
        debug!("Downloading {} to {}", remote.as_ref(), local.display());
        self.guarded(|client| {
            let overwrite = client.options.overwrite;
            let existed = overwrite && local.exists();
            let mut file = open_sink(local, overwrite)?;
            let result = client.transfer(Command::Retr(remote.as_ref().to_string()), |data, _| {
                data.recv_file(&mut file)
            });
            if let Ok(CommandResult::Ok(len)) = &result {
                file.set_len(*len).map_err(|e| FtpError::file(local, e))?;
            } else if !existed {
                drop(file);
                trace!("Removing incomplete file {}", local.display());
                let _ = std::fs::remove_file(local);
            }
            result
        })
    }

    /// Print working directory
    pub fn pwd(&mut self) -> FtpResult<CommandResult> {
        debug!("Getting working directory");
        self.simple_command(Command::Pwd)
    }

    pub fn mkdir<S: AsRef<str>>(&mut self, path: S) -> FtpResult<CommandResult> {
        debug!("Creating directory at {}", path.as_ref());
        self.simple_command(Command::Mkd(path.as_ref().to_string()))
    }

    pub fn rmdir<S: AsRef<str>>(&mut self, path: S) -> FtpResult<CommandResult> {
        debug!("Removing directory {}", path.as_ref());
        self.simple_command(Command::Rmd(path.as_ref().to_string()))
    }

    /// Remove file
    pub fn rm<S: AsRef<str>>(&mut self, path: S) -> FtpResult<CommandResult> {
        debug!("Removing file {}", path.as_ref());
        self.simple_command(Command::Dele(path.as_ref().to_string()))
    }

    /// Get the size of a file; the size is in the reply text
    pub fn size<S: AsRef<str>>(&mut self, path: S) -> FtpResult<CommandResult> {
        debug!("Getting size of {}", path.as_ref());
        self.simple_command(Command::Size(path.as_ref().to_string()))
    }

    /// Get the status of the server, or of `path`
    pub fn stat(&mut self, path: Option<&str>) -> FtpResult<CommandResult> {
        debug!("Getting status of {}", path.unwrap_or("server"));
        self.simple_command(Command::Stat(path.map(str::to_string)))
    }

    /// Get the system type of the server
    pub fn syst(&mut self) -> FtpResult<CommandResult> {
        debug!("Getting system type");
        self.simple_command(Command::Syst)
    }

    /// Ping server
    pub fn noop(&mut self) -> FtpResult<CommandResult> {
        debug!("Pinging server");
        self.simple_command(Command::Noop)
    }

    /// Switch to binary transfers
    pub fn binary(&mut self) -> FtpResult<CommandResult> {
        self.transfer_type(FileType::Image)
    }

    pub fn transfer_type(&mut self, file_type: FileType) -> FtpResult<CommandResult> {
        debug!("Setting transfer type {file_type}");
        self.simple_command(Command::Type(file_type))
    }

    /// Say goodbye to the server. The connection is closed whatever the outcome.
    pub fn close(&mut self) -> FtpResult<CommandResult> {
        debug!("Quitting session");
        let result = self.simple_command(Command::Quit);
        self.control.close();
        result
    }

    /// Drop the connection without notifying the server
    pub fn reset(&mut self) {
        self.control.reset();
    }

    /// Subscribe `observer` to replies and errors. Subscribing twice has no effect.
    ///
    /// Only a weak reference is kept: the observer stops receiving events once dropped.
    pub fn subscribe<O: EventObserver + 'static>(&mut self, observer: &Arc<O>) {
        let observer = Arc::downgrade(observer) as Weak<dyn EventObserver>;
        self.observers.subscribe(observer);
        trace!("{} observer(s) subscribed", self.observers.len());
    }

    pub fn unsubscribe<O: EventObserver + 'static>(&mut self, observer: &Arc<O>) {
        let observer = Arc::downgrade(observer) as Weak<dyn EventObserver>;
        self.observers.unsubscribe(&observer);
        trace!("{} observer(s) subscribed", self.observers.len());
    }

    // -- private

    /// Run `op`; its error is reported to the observers and, when the session can't be trusted anymore,
    /// the control connection is dropped.
    fn guarded<T, F>(&mut self, op: F) -> FtpResult<T>
    where
        F: FnOnce(&mut Self) -> FtpResult<T>,
    {
        let result = op(self);
        if let Err(err) = &result {
            error!("{err}");
            self.observers.error(&err.to_string());
            if err.breaks_session() {
                self.control.reset();
            }
        }
        result
    }

    fn simple_command(&mut self, command: Command) -> FtpResult<CommandResult> {
        self.guarded(|client| client.command(command).map(CommandResult::from))
    }

    /// Send `command` and read its reply
    fn command(&mut self, command: Command) -> FtpResult<Reply> {
        self.perform(command)?;
        self.recv()
    }

    fn perform(&mut self, command: Command) -> FtpResult<()> {
        trace!("CC OUT: {}", command.to_log_string());
        self.control.send(&command.to_string())
    }

    /// Read a reply and report it to the observers
    fn recv(&mut self) -> FtpResult<Reply> {
        let reply = self.control.recv()?;
        self.observers.reply(reply.status_line());
        Ok(reply)
    }

    /// Enter extended passive mode and connect to the announced port
    fn open_data_channel(&mut self) -> FtpResult<CommandResult<DataChannel>> {
        let reply = self.command(Command::Epsv)?;
        if reply.is_negative() {
            return Ok(CommandResult::NotOk(reply));
        }
        let port = reply.epsv_port()?;
        let ip = self.control.peer_ip()?;
        DataChannel::open(ip, port, &self.options).map(CommandResult::Ok)
    }

    /// Run a command which carries a payload on a data channel.
    ///
    /// The data channel is closed before the final reply is read: servers send it only after
    /// they see the data connection closed.
    fn transfer<T, F>(&mut self, command: Command, payload: F) -> FtpResult<CommandResult<T>>
    where
        F: FnOnce(&mut DataChannel, &Observers) -> FtpResult<T>,
    {
        let mut data_channel = match self.open_data_channel()? {
            CommandResult::Ok(channel) => channel,
            CommandResult::NotOk(reply) => return Ok(CommandResult::NotOk(reply)),
        };
        let preliminary = self.command(command)?;
        if preliminary.is_negative() {
            return Ok(CommandResult::NotOk(preliminary));
        }
        let value = payload(&mut data_channel, &self.observers)?;
        data_channel.close()?;
        // some servers skip the 1xx reply and send the final one straight away
        let reply = if preliminary.status_code() < 200 {
            self.recv()?
        } else {
            preliminary
        };

        Ok(CommandResult::from(reply).map(|_| value))
    }
}

fn open_source(path: &Path) -> FtpResult<File> {
    let file = File::open(path).map_err(|e| FtpError::file(path, e))?;
    let metadata = file.metadata().map_err(|e| FtpError::file(path, e))?;
    if metadata.is_dir() {
        return Err(FtpError::file(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "is a directory"),
        ));
    }
    Ok(file)
}

fn open_sink(path: &Path, overwrite: bool) -> FtpResult<File> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(false);
    } else {
        options.create_new(true);
    }
    options.open(path).map_err(|e| FtpError::file(path, e))
}
