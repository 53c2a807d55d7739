//! Command-line and collectd exec environment configuration.
//!
//! collectd starts exec plugins with `COLLECTD_HOSTNAME` and
//! `COLLECTD_INTERVAL` set; both can be overridden with flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::scheduler::MAX_INTERVAL;

/// HAProxy metrics collector for the collectd exec plugin.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "collectd-haproxy",
    about = "Collects HAProxy metrics from its admin socket and prints them as collectd PUTVAL commands",
    version
)]
pub struct Args {
    /// Path to the HAProxy admin socket.
    #[arg(long, default_value = "/var/run/haproxy/admin.sock")]
    pub socket: PathBuf,

    /// Plugin name used in metric identifiers.
    #[arg(long, default_value = "haproxy")]
    pub plugin: String,

    /// Silent mode - discard all log output.
    #[arg(long)]
    pub silent: bool,

    /// Host name used in metric identifiers. Defaults to the system host name.
    #[arg(long, env = "COLLECTD_HOSTNAME")]
    pub hostname: Option<String>,

    /// Collection interval in seconds.
    #[arg(short, long, env = "COLLECTD_INTERVAL", default_value = "10")]
    pub interval: f64,

    /// Socket read/write timeout in seconds (0 disables the timeout).
    #[arg(long, default_value = "0")]
    pub timeout: f64,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidInterval(f64),
    InvalidTimeout(f64),
    EmptyPlugin,
    EmptyHostname,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidInterval(v) => {
                write!(
                    f,
                    "interval must be a positive number of seconds up to {}, got {}",
                    MAX_INTERVAL.as_secs(),
                    v
                )
            }
            ConfigError::InvalidTimeout(v) => {
                write!(f, "timeout must be zero or a positive number of seconds, got {}", v)
            }
            ConfigError::EmptyPlugin => write!(f, "plugin name must not be empty"),
            ConfigError::EmptyHostname => write!(f, "host name must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Log output settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    pub silent: bool,
    pub verbose: u8,
    pub quiet: bool,
}

/// Validated runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub socket: PathBuf,
    pub plugin: String,
    pub hostname: String,
    pub interval: Duration,
    pub timeout: Option<Duration>,
    pub log: LogSettings,
}

impl Args {
    /// Validates the arguments and fills in defaults that need the system.
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let interval = Duration::try_from_secs_f64(self.interval)
            .ok()
            .filter(|d| !d.is_zero() && *d <= MAX_INTERVAL)
            .ok_or(ConfigError::InvalidInterval(self.interval))?;
        let timeout = Duration::try_from_secs_f64(self.timeout)
            .map_err(|_| ConfigError::InvalidTimeout(self.timeout))?;

        let plugin = self.plugin.trim().to_string();
        if plugin.is_empty() {
            return Err(ConfigError::EmptyPlugin);
        }

        let hostname = match self.hostname {
            Some(name) => name.trim().to_string(),
            None => system_hostname(),
        };
        if hostname.is_empty() {
            return Err(ConfigError::EmptyHostname);
        }

        Ok(Settings {
            socket: self.socket,
            plugin,
            hostname,
            interval,
            timeout: (!timeout.is_zero()).then_some(timeout),
            log: LogSettings {
                silent: self.silent,
                verbose: self.verbose,
                quiet: self.quiet,
            },
        })
    }
}

/// Best-effort host name lookup without libc.
fn system_hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .or_else(|| std::env::var("HOSTNAME").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
