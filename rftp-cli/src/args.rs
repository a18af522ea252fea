use argh::FromArgs;

#[derive(FromArgs)]
#[argh(description = "Interactive FTP client. Type `help` at the prompt to list the available commands")]
pub struct Args {
    #[argh(switch, short = 'D', description = "enable TRACE log level")]
    pub debug: bool,
    #[argh(switch, short = 'v', description = "verbose mode")]
    pub verbose: bool,
    #[argh(switch, short = 'V', description = "print version")]
    pub version: bool,
    #[argh(positional, description = "host to connect to, as `host[:port]`")]
    pub host: Option<String>,
}
