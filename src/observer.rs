//! Structured reporting of dropped fields and failed collection steps.
//!
//! Nothing below the scheduler is fatal: a failed fetch, a broken row or a
//! value that does not parse only costs the affected data points. Each such
//! event is handed to an `Observer` so it can be logged in production and
//! asserted on in tests.

use tracing::{error, trace, warn};

use crate::collector::catalog::MetricKind;
use crate::collector::parser::ParseError;
use crate::collector::traits::TransportError;
use crate::writer::WriteError;

/// An event worth reporting during a collection cycle.
#[derive(Debug)]
pub enum Observation<'a> {
    /// The command could not be exchanged with the control socket.
    Transport {
        command: &'a str,
        error: &'a TransportError,
    },
    /// A `show info` line could not be decoded; later lines were skipped.
    InfoLineDecode { line: usize, error: &'a ParseError },
    /// The `show stat` header could not be read; the response was discarded.
    StatsHeader { error: &'a ParseError },
    /// A `show stat` row could not be decoded; later rows were skipped.
    StatsRowDecode { row: usize, error: &'a ParseError },
    /// The field is not in the metric catalog.
    UnknownField { key: &'a str },
    /// The field is known but carries no value.
    EmptyValue { key: &'a str, identifier: &'a str },
    /// The value does not parse as the catalog kind.
    NumericParse {
        key: &'a str,
        value: &'a str,
        kind: MetricKind,
        error: &'a (dyn std::error::Error + 'a),
    },
    /// The metric writer rejected a measurement.
    WriteFailed {
        identifier: &'a str,
        error: &'a WriteError,
    },
}

/// Discriminant of an `Observation`, convenient for filtering and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationKind {
    Transport,
    InfoLineDecode,
    StatsHeader,
    StatsRowDecode,
    UnknownField,
    EmptyValue,
    NumericParse,
    WriteFailed,
}

impl Observation<'_> {
    pub fn kind(&self) -> ObservationKind {
        match self {
            Observation::Transport { .. } => ObservationKind::Transport,
            Observation::InfoLineDecode { .. } => ObservationKind::InfoLineDecode,
            Observation::StatsHeader { .. } => ObservationKind::StatsHeader,
            Observation::StatsRowDecode { .. } => ObservationKind::StatsRowDecode,
            Observation::UnknownField { .. } => ObservationKind::UnknownField,
            Observation::EmptyValue { .. } => ObservationKind::EmptyValue,
            Observation::NumericParse { .. } => ObservationKind::NumericParse,
            Observation::WriteFailed { .. } => ObservationKind::WriteFailed,
        }
    }

    /// Routine events are expected on every cycle (HAProxy reports many
    /// fields the catalog does not track) and are not failures.
    pub fn is_routine(&self) -> bool {
        matches!(
            self,
            Observation::UnknownField { .. } | Observation::EmptyValue { .. }
        )
    }
}

impl std::fmt::Display for Observation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Observation::Transport { command, error } => {
                write!(f, "{:?} failed: {}", command, error)
            }
            Observation::InfoLineDecode { line, error } => {
                write!(f, "show info line {}: {}", line, error)
            }
            Observation::StatsHeader { error } => {
                write!(f, "failed to read show stat header: {}", error)
            }
            Observation::StatsRowDecode { row, error } => {
                write!(f, "show stat row {}: {}", row, error)
            }
            Observation::UnknownField { key } => write!(f, "unknown field {:?}", key),
            Observation::EmptyValue { key, identifier } => {
                write!(f, "empty value for {:?} ({})", key, identifier)
            }
            Observation::NumericParse {
                key,
                value,
                kind,
                error,
            } => write!(
                f,
                "can not convert value {:?} for {:?} to {}: {}",
                value, key, kind, error
            ),
            Observation::WriteFailed { identifier, error } => {
                write!(f, "failed to write {}: {}", identifier, error)
            }
        }
    }
}

/// Receives observations from collection cycles.
pub trait Observer: Send + Sync {
    fn observe(&self, observation: &Observation<'_>);
}

/// Logs observations through `tracing`.
///
/// Routine drops go to TRACE, failures that cost data to WARN, writer
/// failures to ERROR.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn observe(&self, observation: &Observation<'_>) {
        match observation.kind() {
            ObservationKind::UnknownField | ObservationKind::EmptyValue => {
                trace!("{}", observation)
            }
            ObservationKind::WriteFailed => error!("{}", observation),
            _ => warn!("{}", observation),
        }
    }
}
