//! # rftp
//!
//! Interactive FTP client built on the rftp engine
//!

// -- mods
mod actions;
mod args;
mod command;

use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Arc;

use actions::PrintObserver;
use args::Args;
use command::Command;
use env_logger::Builder as LogBuilder;
use log::LevelFilter;
use rftp::Client;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

fn usage() {
    println!("Available commands:");
    println!("open <host> [port]          Connect to remote host; port defaults to 21");
    println!("user [name]                 Login to remote");
    println!("cd <dir>                    Change working directory");
    println!("ls [dir]                    List files. If directory is not provided, current directory is used");
    println!("get <remote> [local]        Download `remote` to `local`");
    println!("put <local> [remote]        Upload local file `local` to `remote`");
    println!("pwd                         Print working directory");
    println!("mkdir <dir>                 Make directory");
    println!("rmdir <dir>                 Remove directory");
    println!("rm <file>                   Remove file");
    println!("size <file>                 Get `file` size");
    println!("stat [path]                 Get server status, or status of `path`");
    println!("syst                        Get system type");
    println!("binary                      Set transfer type to binary");
    println!("noop                        Ping server");
    println!("close                       Close connection");
    println!("help                        Print this help");
    println!("exit                        Quit rftp");
}

/// Read the next command. EOF on stdin is read as `exit`
fn input() -> Command {
    loop {
        print!("rftp> ");
        let _ = io::stdout().flush();
        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => return Command::Exit,
            Ok(_) => {}
        }
        if input.trim().is_empty() {
            continue;
        }
        match Command::from_str(input.as_str()) {
            Ok(cmd) => return cmd,
            Err(err) => println!("{err}"),
        }
    }
}

fn main() {
    let args: Args = argh::from_env();
    // print version
    if args.version {
        println!("rftp {APP_VERSION} - developed by {APP_AUTHORS}");
        return;
    }
    // init logger
    LogBuilder::new()
        .filter_level(if args.debug {
            LevelFilter::Trace
        } else if args.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Off
        })
        .init();

    let observer = Arc::new(PrintObserver);
    let mut client = Client::new();
    client.subscribe(&observer);

    // connect if host is specified
    if let Some(host) = args.host {
        match command::parse_address(&host) {
            Ok(cmd) => perform(&mut client, cmd),
            Err(err) => eprintln!("{err}"),
        }
    }

    loop {
        match input() {
            Command::Exit => {
                if client.is_open() {
                    actions::close(&mut client);
                }
                break;
            }
            cmd => perform(&mut client, cmd),
        }
    }
}

fn perform(client: &mut Client, command: Command) {
    if command.needs_connection() && !client.is_open() {
        eprintln!("Not connected.");
        return;
    }
    match command {
        Command::Binary => {
            let _ = client.binary();
        }
        Command::Cd(dir) => {
            let _ = client.cd(dir);
        }
        Command::Close => actions::close(client),
        Command::Get(remote, local) => actions::get(client, &remote, &local),
        Command::Ls(dir) => actions::ls(client, dir.as_deref()),
        Command::Mkdir(dir) => {
            let _ = client.mkdir(dir);
        }
        Command::Noop => {
            let _ = client.noop();
        }
        Command::Open(host, port) => actions::open(client, &host, port),
        Command::Put(local, remote) => actions::put(client, &local, &remote),
        Command::Pwd => {
            let _ = client.pwd();
        }
        Command::Rm(file) => {
            let _ = client.rm(file);
        }
        Command::Rmdir(dir) => {
            let _ = client.rmdir(dir);
        }
        Command::Size(file) => {
            let _ = client.size(file);
        }
        Command::Stat(path) => {
            let _ = client.stat(path.as_deref());
        }
        Command::Syst => {
            let _ = client.syst();
        }
        Command::User(name) => actions::user(client, name),
        Command::Help => usage(),
        // the prompt loop quits on exit
        Command::Exit => {}
    }
}
