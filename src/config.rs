use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::error::ServerError;
use crate::files::DEFAULT_REQUEST_TTL;
use crate::server::DEFAULT_POLL_INTERVAL;

pub const DEFAULT_PORT: u16 = 8123;
pub const DEFAULT_LOG_FILE: &str = "dnc_server.log";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dnc_server",
    version,
    about = "Runs a DNC server",
    long_about = "Runs a DNC server.\n\nFor a detailed description of the DNC protocol, use the --rfc option."
)]
pub struct Cli {
    /// The port to be used by the server
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// The file in which requests are logged
    #[arg(default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Also print the log on the screen
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the RFC of the DNC protocol, then exit
    #[arg(long)]
    pub rfc: bool,

    /// An .ini file overriding the settings:
    /// [network] port, [log] verbose / log_file,
    /// [server] poll_interval_ms, [files] request_ttl_secs
    #[arg(short, long, value_name = "FILE")]
    pub conf: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub log_file: PathBuf,
    pub verbose: bool,
    pub poll_interval: Duration,
    pub file_request_ttl: Duration,
}

#[derive(Debug, Default, Deserialize)]
struct IniFile {
    #[serde(default)]
    network: NetworkSection,
    #[serde(default)]
    log: LogSection,
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    files: FilesSection,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkSection {
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LogSection {
    verbose: Option<bool>,
    log_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FilesSection {
    request_ttl_secs: Option<u64>,
}

impl Settings {
    /// Command line values, overridden by the `--conf` file if any.
    pub fn load(cli: &Cli) -> Result<Self, ServerError> {
        let mut settings = Settings::from(cli);
        if let Some(path) = &cli.conf {
            settings.apply_ini(path)?;
        }
        Ok(settings)
    }

    fn apply_ini(&mut self, path: &Path) -> Result<(), ServerError> {
        if !path.exists() {
            return Err(ServerError::MissingConfig(path.display().to_string()));
        }
        let ini: IniFile = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Ini))
            .build()?
            .try_deserialize()?;

        if let Some(port) = ini.network.port {
            self.port = port;
        }
        if let Some(verbose) = ini.log.verbose {
            self.verbose = verbose;
        }
        if let Some(log_file) = ini.log.log_file {
            self.log_file = log_file;
        }
        if let Some(ms) = ini.server.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(secs) = ini.files.request_ttl_secs {
            self.file_request_ttl = Duration::from_secs(secs);
        }
        Ok(())
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

impl From<&Cli> for Settings {
    fn from(cli: &Cli) -> Self {
        Settings {
            port: cli.port,
            log_file: cli.log_file.clone(),
            verbose: cli.verbose,
            poll_interval: DEFAULT_POLL_INTERVAL,
            file_request_ttl: DEFAULT_REQUEST_TTL,
        }
    }
}
