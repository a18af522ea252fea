//! Command handlers. Replies and errors are printed by the observer; handlers only print payloads.

use std::io::{self, Write};
use std::path::Path;

use rftp::{Client, CommandResult, EventObserver, FtpResult};

/// Prints replies to stdout and errors to stderr
pub struct PrintObserver;

impl EventObserver for PrintObserver {
    fn on_reply(&self, reply: &str) {
        print!("{reply}");
        if !reply.ends_with('\n') {
            println!();
        }
        let _ = io::stdout().flush();
    }

    fn on_error(&self, error: &str) {
        eprintln!("{error}");
    }
}

pub fn open(client: &mut Client, host: &str, port: u16) {
    if client.is_open() {
        eprintln!("Already connected, use `close` first.");
        return;
    }
    let _ = client.open(host, port);
}

pub fn close(client: &mut Client) {
    let _ = client.close();
}

pub fn user(client: &mut Client, name: Option<String>) {
    let name = match name {
        Some(name) => name,
        None => match read_line("Name: ") {
            Ok(name) => name,
            Err(err) => {
                eprintln!("Could not read username: {err}");
                return;
            }
        },
    };
    let password = match rpassword::prompt_password("Password: ") {
        Ok(p) => p,
        Err(err) => {
            eprintln!("Could not read password: {err}");
            return;
        }
    };
    let _ = client.login(name.as_str(), password.as_str());
}

pub fn ls(client: &mut Client, path: Option<&str>) {
    // the listing is relayed to the observer
    let _ = client.ls(path);
}

pub fn get(client: &mut Client, remote: &str, local: &Path) {
    print_transferred(client.download(remote, local));
}

pub fn put(client: &mut Client, local: &Path, remote: &str) {
    print_transferred(client.upload(local, remote));
}

fn print_transferred(result: FtpResult<CommandResult<u64>>) {
    if let Ok(CommandResult::Ok(bytes)) = result {
        println!("{bytes} bytes transferred");
    }
}

fn read_line(prompt: &str) -> io::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
