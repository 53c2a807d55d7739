//! Collection cycles: fetch a response, parse it, report every field.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::collector::parser::{self, FieldRecord, ParseError};
use crate::collector::pool::BufferPool;
use crate::collector::reporter::{ReportOutcome, Reporter};
use crate::collector::traits::{ControlSocket, TransportError};
use crate::observer::{Observation, Observer};

/// The two independent polling jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleKind {
    /// `show info`: process-wide key/value counters.
    Info,
    /// `show stat`: per proxy/service CSV table.
    Stats,
}

impl CycleKind {
    pub const ALL: [CycleKind; 2] = [CycleKind::Info, CycleKind::Stats];

    /// Admin socket command for this cycle.
    pub fn command(self) -> &'static str {
        match self {
            CycleKind::Info => "show info",
            CycleKind::Stats => "show stat",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CycleKind::Info => "info",
            CycleKind::Stats => "stats",
        }
    }
}

/// Why a cycle ended before reporting.
#[derive(Debug)]
pub enum CycleError {
    Transport(TransportError),
    Header(ParseError),
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleError::Transport(e) => write!(f, "transport: {}", e),
            CycleError::Header(e) => write!(f, "header: {}", e),
        }
    }
}

impl std::error::Error for CycleError {}

impl From<TransportError> for CycleError {
    fn from(e: TransportError) -> Self {
        CycleError::Transport(e)
    }
}

/// Counters for one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Bytes received from the control socket.
    pub bytes: usize,
    /// Fields produced by the parser.
    pub records: usize,
    pub emitted: usize,
    pub dropped: usize,
    pub write_failures: usize,
}

/// Runs collection cycles against one control socket.
///
/// Shared between the info and stats threads; every cycle uses its own
/// connection and its own pooled buffer.
pub struct Collector<S: ControlSocket> {
    socket: S,
    reporter: Reporter,
    observer: Arc<dyn Observer>,
    pool: BufferPool,
    interval: Duration,
}

impl<S: ControlSocket> Collector<S> {
    /// Creates a collector.
    ///
    /// # Arguments
    /// * `socket` - Control socket implementation (real or mock)
    /// * `reporter` - Classifies fields and writes measurements
    /// * `observer` - Receives transport and parse anomalies
    /// * `interval` - Reporting interval stamped on every measurement
    pub fn new(
        socket: S,
        reporter: Reporter,
        observer: Arc<dyn Observer>,
        interval: Duration,
    ) -> Self {
        Self {
            socket,
            reporter,
            observer,
            pool: BufferPool::new(),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    /// Runs one full fetch, parse and report pass.
    ///
    /// Fails only when nothing could be reported: the socket exchange failed
    /// or the `show stat` header was unreadable. Both are observed before
    /// returning.
    pub fn collect(&self, kind: CycleKind, now: DateTime<Utc>) -> Result<CycleStats, CycleError> {
        let command = kind.command();
        let mut buf = self.pool.acquire();

        if let Err(error) = self.socket.fetch(command, &mut buf) {
            self.observer
                .observe(&Observation::Transport { command, error: &error });
            return Err(error.into());
        }

        let records = match kind {
            CycleKind::Info => parser::parse_info(&buf, self.observer.as_ref()),
            CycleKind::Stats => match parser::parse_stats(&buf, self.observer.as_ref()) {
                Ok(records) => records,
                Err(error) => {
                    self.observer
                        .observe(&Observation::StatsHeader { error: &error });
                    return Err(CycleError::Header(error));
                }
            },
        };

        let mut stats = self.report_all(&records, now);
        stats.bytes = buf.len();
        Ok(stats)
    }

    fn report_all(&self, records: &[FieldRecord], now: DateTime<Utc>) -> CycleStats {
        let mut stats = CycleStats {
            records: records.len(),
            ..Default::default()
        };
        for record in records {
            match self.reporter.report(record, now, self.interval) {
                ReportOutcome::Emitted => stats.emitted += 1,
                ReportOutcome::WriteFailed => stats.write_failures += 1,
                ReportOutcome::Dropped(_) => stats.dropped += 1,
            }
        }
        stats
    }
}
