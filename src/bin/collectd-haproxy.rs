//! collectd-haproxy - collectd exec plugin for HAProxy.
//!
//! Polls the HAProxy admin socket and prints `PUTVAL` commands on stdout.
//! Example collectd configuration:
//!
//! ```text
//! LoadPlugin exec
//! <Plugin exec>
//!   Exec "haproxy" "/usr/local/bin/collectd-haproxy" "--silent"
//! </Plugin>
//! ```

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use collectd_haproxy::collector::{Collector, Identity, Reporter, UnixControlSocket};
use collectd_haproxy::config::{Args, LogSettings};
use collectd_haproxy::observer::TracingObserver;
use collectd_haproxy::scheduler::Scheduler;
use collectd_haproxy::writer::PutvalWriter;

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
///
/// Logs go to stderr: stdout is the collectd exec channel. In silent mode no
/// subscriber is installed and every event is discarded.
fn init_logging(log: LogSettings) {
    if log.silent {
        return;
    }

    let level = if log.quiet {
        Level::ERROR
    } else {
        match log.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    // The library and the binary share the `collectd_haproxy` target prefix.
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("collectd_haproxy={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    let settings = match args.into_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("collectd-haproxy: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(settings.log);

    info!("collectd-haproxy {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: socket={}, host={}, plugin={}, interval={:?}, timeout={:?}",
        settings.socket.display(),
        settings.hostname,
        settings.plugin,
        settings.interval,
        settings.timeout
    );

    let observer = Arc::new(TracingObserver);
    let reporter = Reporter::new(
        Identity {
            host: settings.hostname.clone(),
            plugin: settings.plugin.clone(),
        },
        Arc::new(PutvalWriter::stdout()),
        observer.clone(),
    );
    let socket = UnixControlSocket::new(&settings.socket).with_timeout(settings.timeout);
    let collector = Arc::new(Collector::new(socket, reporter, observer, settings.interval));

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set signal handler: {}", e);
    }

    if let Err(e) = Scheduler::new(collector, running).run() {
        error!("Scheduler failed: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}
