#![crate_name = "rftp"]
#![crate_type = "lib"]

//! # rftp
//!
//! rftp is a synchronous FTP client engine (RFC 959) which opens its data connections
//! in extended passive mode (RFC 2428).
//!
//! The engine drives exactly one control connection per [`Client`] and at most one data
//! connection at a time. Every operation blocks the calling thread until the server has answered.
//!
//! ## Results
//!
//! Every operation returns a [`FtpResult`] wrapping a [`CommandResult`]:
//!
//! - `Ok(CommandResult::Ok(value))`: the server accepted the command;
//! - `Ok(CommandResult::NotOk(reply))`: the server rejected the command (reply code >= 400);
//! - `Err(FtpError)`: the transport failed, the server violated the protocol or a local file
//!   couldn't be opened.
//!
//! After a [`FtpError::ConnectionError`] or a [`FtpError::ProtocolError`] the session is reset and
//! must be opened again.
//!
//! ## Observers
//!
//! Any type implementing [`EventObserver`] can be subscribed to a [`Client`] in order to receive a
//! live feed of the server replies and of the errors.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rftp::{Client, CommandResult};
//!
//! let mut client = Client::new();
//! client.open("127.0.0.1", 21).unwrap();
//! match client.login("test", "test").unwrap() {
//!     CommandResult::Ok(_) => println!("logged in"),
//!     CommandResult::NotOk(reply) => println!("login refused: {reply}"),
//! }
//! client.binary().unwrap();
//! if let CommandResult::Ok(listing) = client.ls(None).unwrap() {
//!     print!("{listing}");
//! }
//! client.close().unwrap();
//! ```

// -- common deps
#[macro_use]
extern crate log;

// -- private
pub(crate) mod command;
#[cfg(test)]
mod test_server;

// -- public
pub mod client;
pub mod observer;
pub mod reply;
pub mod types;

// -- export
pub use client::Client;
pub use observer::EventObserver;
pub use reply::Reply;
pub use types::{ClientOptions, CommandResult, FileType, FtpError, FtpResult, ProtocolViolation};

// -- test logging
#[cfg(test)]
pub fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
