//! Command-line interface for docwarden.
//!
//! Uses lexopt to keep the binary small.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::session::{Priority, SessionContext};

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Documents to open.
    pub files: Vec<PathBuf>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Capacity override.
    pub max_concurrent: Option<usize>,
    /// Priority for every opened document.
    pub priority: Option<Priority>,
    /// Context for every opened document.
    pub context: Option<SessionContext>,
    /// Open as background work instead of interactive windows.
    pub background: bool,
    /// Open the files side by side as a comparison group.
    pub compare: bool,
    /// Open the files as one client's portfolio.
    pub client: Option<String>,
    /// Periodic sweep interval override in seconds; 0 disables it.
    pub sweep_interval: Option<u64>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('m') | Long("max-concurrent") => {
                let value: String = parser.value()?.parse()?;
                result.max_concurrent = Some(
                    value
                        .parse()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ArgsError::InvalidValue("max-concurrent", value))?,
                );
            }
            Short('p') | Long("priority") => {
                let value: String = parser.value()?.parse()?;
                result.priority = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("priority", value))?,
                );
            }
            Short('x') | Long("context") => {
                let value: String = parser.value()?.parse()?;
                result.context = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("context", value))?,
                );
            }
            Long("background") => {
                result.background = true;
            }
            Long("compare") => {
                result.compare = true;
            }
            Long("client") => {
                result.client = Some(parser.value()?.parse()?);
            }
            Long("sweep-interval") => {
                let value: String = parser.value()?.parse()?;
                result.sweep_interval = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("sweep-interval", value))?,
                );
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                result.files.push(PathBuf::from(val));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if result.compare && result.client.is_some() {
        return Err(ArgsError::Conflict("compare", "client"));
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"docwarden {version}
Capacity-bounded session manager for office documents

USAGE:
    docwarden [OPTIONS] <FILE>...

OPTIONS:
    -c, --config <FILE>          Path to configuration file (JSON)
    -m, --max-concurrent <N>     Maximum open documents [default: 4]
    -p, --priority <P>           Priority 1-5 or name [default: 3]
    -x, --context <CTX>          human_validation, collaborative, automated, background
        --background             Open as background work (priority 5, background context)
        --compare                Open up to 4 files side by side as a comparison group
        --client <NAME>          Open the files as one client's portfolio
        --sweep-interval <SECS>  Seconds between sweeps, 0 disables [default: 30]
    -l, --log-level <LVL>        Log level (error, warn, info, debug, trace)
    -h, --help                   Print help
    -V, --version                Print version

ENVIRONMENT VARIABLES:
    DOCWARDEN_MAX_CONCURRENT     Capacity (overrides config)
    DOCWARDEN_LOG_LEVEL          Log level (overrides config)
    RUST_LOG                     Alternative log level setting

EXAMPLES:
    # Review one document
    docwarden report.odt

    # Compare three templates
    docwarden --compare a.odt b.odt c.odt

    # Convert in the background with a custom config
    docwarden -c /etc/docwarden.json --background draft.odt
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("docwarden {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Two options that cannot be combined.
    Conflict(&'static str, &'static str),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::Conflict(a, b) => {
                write!(f, "--{} cannot be used with --{}", a, b)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
