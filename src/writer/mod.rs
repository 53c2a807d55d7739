//! Measurements and the sink they are written to.

pub mod putval;

use std::io;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::collector::catalog::MetricKind;

pub use putval::PutvalWriter;

/// A typed metric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Derive(i64),
    Gauge(f64),
}

impl Value {
    pub fn kind(&self) -> MetricKind {
        match self {
            Value::Derive(_) => MetricKind::Derive,
            Value::Gauge(_) => MetricKind::Gauge,
        }
    }
}

/// One data point handed to the metric writer.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub host: String,
    pub plugin: String,
    /// Dotted name, e.g. `srv1.web.bytes_in` or `max_connections`.
    pub identifier: String,
    pub value: Value,
    pub timestamp: DateTime<Utc>,
    pub interval: Duration,
}

impl Measurement {
    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }
}

#[derive(Debug)]
pub enum WriteError {
    Io(io::Error),
    /// The writer's lock was poisoned by a panicking thread.
    Poisoned,
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Io(e) => write!(f, "I/O error: {}", e),
            WriteError::Poisoned => write!(f, "writer lock poisoned"),
        }
    }
}

impl std::error::Error for WriteError {}

impl From<io::Error> for WriteError {
    fn from(e: io::Error) -> Self {
        WriteError::Io(e)
    }
}

/// Destination for measurements.
///
/// Called once per successfully classified field, possibly from both
/// collection threads at the same time.
pub trait MetricWriter: Send + Sync {
    fn write(&self, measurement: &Measurement) -> Result<(), WriteError>;
}
