use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 21;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Binary,
    Cd(String),
    Close,
    Exit,
    Get(String, PathBuf),
    Help,
    Ls(Option<String>),
    Mkdir(String),
    Noop,
    Open(String, u16),
    Put(PathBuf, String),
    Pwd,
    Rm(String),
    Rmdir(String),
    Size(String),
    Stat(Option<String>),
    Syst,
    User(Option<String>),
}

impl Command {
    /// Returns whether the command needs an open session
    pub fn needs_connection(&self) -> bool {
        !matches!(self, Self::Open(..) | Self::Help | Self::Exit)
    }
}

impl FromStr for Command {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut args = s.split_ascii_whitespace();
        match args.next() {
            Some(cmd) => match cmd.to_ascii_lowercase().as_str() {
                "binary" => Ok(Self::Binary),
                "cd" => match args.next() {
                    Some(dir) => Ok(Self::Cd(dir.to_string())),
                    None => Err("Missing `dir` field"),
                },
                "close" => Ok(Self::Close),
                "exit" | "quit" => Ok(Self::Exit),
                "get" => {
                    let remote = match args.next() {
                        Some(r) => r.to_string(),
                        None => return Err("Missing `remote` field"),
                    };
                    let local = match args.next() {
                        Some(l) => PathBuf::from(l),
                        None => PathBuf::from(file_name(&remote)),
                    };
                    Ok(Self::Get(remote, local))
                }
                "help" => Ok(Self::Help),
                "ls" => Ok(Self::Ls(args.next().map(str::to_string))),
                "mkdir" => match args.next() {
                    Some(dir) => Ok(Self::Mkdir(dir.to_string())),
                    None => Err("Missing `dir` field"),
                },
                "noop" => Ok(Self::Noop),
                "open" => {
                    let Some(host) = args.next() else {
                        return Err("Missing `host` field");
                    };
                    match args.next() {
                        Some(port) => port
                            .parse::<u16>()
                            .map(|port| Self::Open(host.to_string(), port))
                            .map_err(|_| "Invalid `port` field"),
                        None => parse_address(host),
                    }
                }
                "put" => {
                    let local = match args.next() {
                        Some(l) => PathBuf::from(l),
                        None => return Err("Missing `local` field"),
                    };
                    let remote = match args.next() {
                        Some(r) => r.to_string(),
                        None => match local.file_name() {
                            Some(name) => name.to_string_lossy().to_string(),
                            None => return Err("Missing `remote` field"),
                        },
                    };
                    Ok(Self::Put(local, remote))
                }
                "pwd" => Ok(Self::Pwd),
                "rm" => match args.next() {
                    Some(file) => Ok(Self::Rm(file.to_string())),
                    None => Err("Missing `file` field"),
                },
                "rmdir" => match args.next() {
                    Some(dir) => Ok(Self::Rmdir(dir.to_string())),
                    None => Err("Missing `dir` field"),
                },
                "size" => match args.next() {
                    Some(file) => Ok(Self::Size(file.to_string())),
                    None => Err("Missing `file` field"),
                },
                "stat" => Ok(Self::Stat(args.next().map(str::to_string))),
                "syst" => Ok(Self::Syst),
                "user" => Ok(Self::User(args.next().map(str::to_string))),
                _ => Err("Unknown command"),
            },
            None => Err("Unknown command"),
        }
    }
}

/// Parse `host[:port]` into an open command
pub fn parse_address(address: &str) -> Result<Command, &'static str> {
    match address.rsplit_once(':') {
        // bare IPv6 address
        Some((host, _)) if host.contains(':') && !host.ends_with(']') => {
            Ok(Command::Open(address.to_string(), DEFAULT_PORT))
        }
        Some((host, port)) => port
            .parse::<u16>()
            .map(|port| {
                Command::Open(
                    host.trim_start_matches('[').trim_end_matches(']').to_string(),
                    port,
                )
            })
            .map_err(|_| "Invalid `port` field"),
        None => Ok(Command::Open(address.to_string(), DEFAULT_PORT)),
    }
}

fn file_name(remote: &str) -> &str {
    remote.rsplit('/').next().unwrap_or(remote)
}
