//! # Test server
//!
//! In-process FTP server used by the client tests. It serves an in-memory filesystem to one session at a time
//! and records the commands it receives.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Behaviour of the test server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Raw greeting, CRLF included
    pub greeting: String,
    pub username: String,
    pub password: String,
    /// USER is answered with 230 instead of 331
    pub anonymous: bool,
    /// USER is answered with 332
    pub need_account: bool,
    /// Raw reply sent for EPSV instead of the real one; no data port is opened
    pub epsv_reply: Option<String>,
    /// Drop the control connection without replying when this verb is received
    pub drop_on: Option<&'static str>,
    /// Close the control connection right after the greeting
    pub close_after_greeting: bool,
    /// Abort the session after this amount of bytes of a RETR or STOR payload
    pub abort_transfer_after: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            greeting: "220 FTP server is ready.\r\n".to_string(),
            username: "user".to_string(),
            password: "password".to_string(),
            anonymous: false,
            need_account: false,
            epsv_reply: None,
            drop_on: None,
            close_after_greeting: false,
            abort_transfer_after: None,
        }
    }
}

#[derive(Debug)]
struct Filesystem {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
}

impl Default for Filesystem {
    fn default() -> Self {
        Self {
            dirs: BTreeSet::from(["/".to_string()]),
            files: BTreeMap::new(),
        }
    }
}

impl Filesystem {
    fn children(&self, dir: &str) -> Vec<String> {
        let dirs = self
            .dirs
            .iter()
            .filter(|x| x.as_str() != "/" && parent(x) == dir)
            .map(|x| format!("drwxr-xr-x 2 user staff 64 Aug 23 11:45 {}\r\n", name(x)));
        let files = self
            .files
            .iter()
            .filter(|(x, _)| parent(x) == dir)
            .map(|(x, data)| {
                format!(
                    "-rw-r--r-- 1 user staff {} Aug 23 11:45 {}\r\n",
                    data.len(),
                    name(x)
                )
            });
        dirs.chain(files).collect()
    }
}

#[derive(Debug, Default)]
struct Journal {
    commands: Vec<String>,
    data_closed_first: Vec<bool>,
    sessions: usize,
}

/// FTP server running on a background thread, listening on an ephemeral port of localhost
pub struct TestServer {
    port: u16,
    running: Arc<AtomicBool>,
    fs: Arc<Mutex<Filesystem>>,
    journal: Arc<Mutex<Journal>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn start() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind test server");
        let port = listener.local_addr().expect("no local address").port();
        let running = Arc::new(AtomicBool::new(true));
        let fs = Arc::new(Mutex::new(Filesystem::default()));
        let journal = Arc::new(Mutex::new(Journal::default()));

        let handle = {
            let running = running.clone();
            let fs = fs.clone();
            let journal = journal.clone();
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };
                    journal.lock().unwrap().sessions += 1;
                    if let Err(err) = Session::new(&config, &fs, &journal, stream).and_then(Session::run) {
                        debug!("test server session ended with error: {err}");
                    }
                }
            })
        };

        Self {
            port,
            running,
            fs,
            journal,
            handle: Some(handle),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Command lines received so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.journal.lock().unwrap().commands.clone()
    }

    /// For each LIST or RETR, whether the client closed the data connection before the final reply was sent
    pub fn data_closed_first(&self) -> Vec<bool> {
        self.journal.lock().unwrap().data_closed_first.clone()
    }

    /// Amount of control connections accepted so far
    pub fn sessions(&self) -> usize {
        self.journal.lock().unwrap().sessions
    }

    pub fn put_file(&self, path: &str, data: &[u8]) {
        self.fs
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), data.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.fs.lock().unwrap().files.get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.fs.lock().unwrap().dirs.contains(path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // wake up the accept loop
        let _ = TcpStream::connect(("127.0.0.1", self.port));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct Session<'a> {
    config: &'a ServerConfig,
    fs: &'a Mutex<Filesystem>,
    journal: &'a Mutex<Journal>,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    cwd: String,
    user: Option<String>,
    passive: Option<TcpListener>,
}

impl<'a> Session<'a> {
    fn new(
        config: &'a ServerConfig,
        fs: &'a Mutex<Filesystem>,
        journal: &'a Mutex<Journal>,
        stream: TcpStream,
    ) -> io::Result<Self> {
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        Ok(Self {
            config,
            fs,
            journal,
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
            cwd: "/".to_string(),
            user: None,
            passive: None,
        })
    }

    fn run(mut self) -> io::Result<()> {
        let config = self.config;
        self.raw(&config.greeting)?;
        if config.close_after_greeting {
            return Ok(());
        }
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            self.journal.lock().unwrap().commands.push(line.clone());
            let (verb, arg) = match line.split_once(' ') {
                Some((verb, arg)) => (verb.to_ascii_uppercase(), Some(arg.to_string())),
                None => (line.to_ascii_uppercase(), None),
            };
            if config.drop_on == Some(verb.as_str()) {
                return Ok(());
            }
            match verb.as_str() {
                "USER" => self.user(arg)?,
                "PASS" => self.pass(arg)?,
                "CWD" => self.cwd(arg)?,
                "PWD" => {
                    let reply = format!("257 \"{}\" is the current directory.", self.cwd);
                    self.reply(&reply)?
                }
                "MKD" => self.mkd(arg)?,
                "RMD" => self.rmd(arg)?,
                "DELE" => self.dele(arg)?,
                "SIZE" => self.size(arg)?,
                "STAT" => self.stat(arg)?,
                "SYST" => self.reply("215 UNIX Type: L8")?,
                "NOOP" => self.reply("200 I successfully done nothin'.")?,
                "TYPE" => match arg.as_deref() {
                    Some("I") => self.reply("200 Type set to: Binary.")?,
                    Some("A") => self.reply("200 Type set to: ASCII.")?,
                    _ => self.reply("504 Unsupported type.")?,
                },
                "EPSV" => self.epsv()?,
                "LIST" => self.list(arg)?,
                "RETR" => self.retr(arg)?,
                "STOR" => self.stor(arg)?,
                "QUIT" => {
                    self.reply("221 Goodbye.")?;
                    return Ok(());
                }
                _ => self.reply("500 Command not understood.")?,
            }
        }
    }

    fn user(&mut self, arg: Option<String>) -> io::Result<()> {
        self.user = arg;
        if self.config.need_account {
            self.reply("332 Need account for login.")
        } else if self.config.anonymous {
            self.reply("230 Login successful.")
        } else {
            self.reply("331 Username ok, send password.")
        }
    }

    fn pass(&mut self, arg: Option<String>) -> io::Result<()> {
        let config = self.config;
        if self.user.as_deref() == Some(config.username.as_str())
            && arg.as_deref() == Some(config.password.as_str())
        {
            self.reply("230 Login successful.")
        } else {
            self.reply("530 Authentication failed.")
        }
    }

    fn cwd(&mut self, arg: Option<String>) -> io::Result<()> {
        let path = self.resolve(arg.as_deref().unwrap_or("/"));
        if self.fs.lock().unwrap().dirs.contains(&path) {
            let reply = format!("250 \"{path}\" is the current directory.");
            self.cwd = path;
            self.reply(&reply)
        } else {
            self.reply("550 No such file or directory.")
        }
    }

    fn mkd(&mut self, arg: Option<String>) -> io::Result<()> {
        let path = self.resolve(arg.as_deref().unwrap_or_default());
        let created = {
            let mut fs = self.fs.lock().unwrap();
            let exists = fs.dirs.contains(&path) || fs.files.contains_key(&path);
            let parent_exists = fs.dirs.contains(parent(&path));
            !exists && parent_exists && fs.dirs.insert(path.clone())
        };
        if created {
            self.reply(&format!("257 \"{path}\" directory created."))
        } else {
            self.reply("550 File exists.")
        }
    }

    fn rmd(&mut self, arg: Option<String>) -> io::Result<()> {
        let path = self.resolve(arg.as_deref().unwrap_or_default());
        let removed = {
            let mut fs = self.fs.lock().unwrap();
            path != "/" && fs.children(&path).is_empty() && fs.dirs.remove(&path)
        };
        if removed {
            self.reply("250 Directory removed.")
        } else {
            self.reply("550 No such file or directory.")
        }
    }

    fn dele(&mut self, arg: Option<String>) -> io::Result<()> {
        let path = self.resolve(arg.as_deref().unwrap_or_default());
        let removed = self.fs.lock().unwrap().files.remove(&path).is_some();
        if removed {
            self.reply("250 File removed.")
        } else {
            self.reply("550 No such file or directory.")
        }
    }

    fn size(&mut self, arg: Option<String>) -> io::Result<()> {
        let path = self.resolve(arg.as_deref().unwrap_or_default());
        let size = self.fs.lock().unwrap().files.get(&path).map(Vec::len);
        match size {
            Some(size) => self.reply(&format!("213 {size}")),
            None => self.reply(&format!("550 {path} is not retrievable.")),
        }
    }

    fn stat(&mut self, arg: Option<String>) -> io::Result<()> {
        let Some(arg) = arg else {
            return self.raw("211-FTP server status:\r\n Connected to 127.0.0.1\r\n211 End of status.\r\n");
        };
        let path = self.resolve(&arg);
        let listing = {
            let fs = self.fs.lock().unwrap();
            fs.dirs.contains(&path).then(|| fs.children(&path).concat())
        };
        match listing {
            Some(listing) => self.raw(&format!(
                "213-Status of \"{path}\":\r\n{listing}213 End of status.\r\n"
            )),
            None => self.reply("550 No such file or directory."),
        }
    }

    fn epsv(&mut self) -> io::Result<()> {
        if let Some(reply) = self.config.epsv_reply.as_deref() {
            return self.raw(reply);
        }
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        self.passive = Some(listener);
        self.reply(&format!(
            "229 Entering extended passive mode (|||{port}|)."
        ))
    }

    fn list(&mut self, arg: Option<String>) -> io::Result<()> {
        let path = self.resolve(arg.as_deref().unwrap_or("."));
        let listing = {
            let fs = self.fs.lock().unwrap();
            fs.dirs.contains(&path).then(|| fs.children(&path).concat())
        };
        let Some(listing) = listing else {
            self.passive = None;
            return self.reply("550 No such file or directory.");
        };
        let Some(mut stream) = self.accept_data()? else {
            return Ok(());
        };
        self.reply("125 Data connection already open. Transfer starting.")?;
        stream.write_all(listing.as_bytes())?;
        self.finish_outgoing(stream)
    }

    fn retr(&mut self, arg: Option<String>) -> io::Result<()> {
        let path = self.resolve(arg.as_deref().unwrap_or_default());
        let data = self.fs.lock().unwrap().files.get(&path).cloned();
        let Some(data) = data else {
            self.passive = None;
            return self.reply("550 No such file or directory.");
        };
        let Some(mut stream) = self.accept_data()? else {
            return Ok(());
        };
        self.reply("125 Data connection already open. Transfer starting.")?;
        if let Some(limit) = self.config.abort_transfer_after {
            stream.write_all(&data[..limit.min(data.len())])?;
            return Err(aborted());
        }
        stream.write_all(&data)?;
        self.finish_outgoing(stream)
    }

    fn stor(&mut self, arg: Option<String>) -> io::Result<()> {
        let path = self.resolve(arg.as_deref().unwrap_or_default());
        let parent_exists = self.fs.lock().unwrap().dirs.contains(parent(&path));
        if !parent_exists {
            self.passive = None;
            return self.reply("553 Could not create file.");
        }
        let Some(mut stream) = self.accept_data()? else {
            return Ok(());
        };
        self.reply("125 Data connection already open. Transfer starting.")?;
        if let Some(limit) = self.config.abort_transfer_after {
            let mut partial = vec![0u8; limit];
            stream.read_exact(&mut partial)?;
            return Err(aborted());
        }
        let mut data = Vec::new();
        stream.read_to_end(&mut data)?;
        drop(stream);
        self.fs.lock().unwrap().files.insert(path, data);
        self.reply("226 Transfer complete.")
    }

    fn accept_data(&mut self) -> io::Result<Option<TcpStream>> {
        let Some(listener) = self.passive.take() else {
            self.reply("425 Use PORT or EPSV first.")?;
            return Ok(None);
        };
        let (stream, _) = listener.accept()?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        Ok(Some(stream))
    }

    /// Signal the end of the payload, then wait for the client to close the connection before replying
    fn finish_outgoing(&mut self, mut stream: TcpStream) -> io::Result<()> {
        stream.shutdown(Shutdown::Write)?;
        let mut buf = [0u8; 64];
        let closed = loop {
            match stream.read(&mut buf) {
                Ok(0) => break true,
                Ok(_) => continue,
                Err(_) => break false,
            }
        };
        self.journal.lock().unwrap().data_closed_first.push(closed);
        drop(stream);
        self.reply("226 Transfer complete.")
    }

    fn resolve(&self, arg: &str) -> String {
        let joined = if arg.starts_with('/') {
            arg.to_string()
        } else {
            format!("{}/{}", self.cwd, arg)
        };
        let mut parts: Vec<&str> = Vec::new();
        for part in joined.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                part => parts.push(part),
            }
        }
        format!("/{}", parts.join("/"))
    }

    fn reply(&mut self, line: &str) -> io::Result<()> {
        self.raw(&format!("{line}\r\n"))
    }

    fn raw(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes())?;
        self.writer.flush()
    }
}

fn aborted() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "transfer aborted")
}

fn parent(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

fn name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}
